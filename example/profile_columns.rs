use ctrkit::prelude::*;
use ctrkit::profiling::{self, OUTPUT_DIR};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let train_input_file = env::args()
        .nth(1)
        .ok_or_else(|| NNError::Other("usage: profile_columns <train.csv>".to_string()))?;

    profiling::run(&train_input_file, OUTPUT_DIR)?;

    Ok(())
}
