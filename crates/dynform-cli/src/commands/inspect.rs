use std::path::Path;

use dynform_core::form::FieldBucket;
use dynform_core::models::validate_descriptors;

use crate::commands::common::{field_items, format_field_lines, load_descriptors};
use crate::error::CliError;

pub fn run_inspect(descriptors_path: &Path, as_json: bool) -> Result<(), CliError> {
    let descriptors = load_descriptors(descriptors_path)?;
    validate_descriptors(&descriptors)?;
    let bucket = FieldBucket::partition(&descriptors);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&field_items(&bucket))?);
    } else {
        for line in format_field_lines(&bucket) {
            println!("{line}");
        }
    }

    Ok(())
}
