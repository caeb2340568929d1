pub mod batches;
pub mod courses;
pub mod semesters;
