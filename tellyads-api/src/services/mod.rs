pub mod capture;
pub mod feedback;
pub mod queue;
