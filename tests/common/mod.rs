#![allow(dead_code)]

use std::error::Error;

pub use proctask_test_utils::builders;
pub use proctask_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;
