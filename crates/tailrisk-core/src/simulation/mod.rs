pub mod student_t;

pub use student_t::{sample_mean_covariance, simulate_student_t, StudentTSimInput};
