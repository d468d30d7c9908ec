// `lvdisplay` output parsing
//
// lvdisplay prints one labelled field per line:
//
//   --- Logical volume ---
//   LV Path                /dev/vg001/vol1
//   LV Name                vol1
//   LV Status              available
//
// Only the path and status are extracted. A label that never appears is not
// an error; a label that appears without a value is.

use thiserror::Error;

pub const LV_PATH_LABEL: &str = "LV Path";
pub const LV_STATUS_LABEL: &str = "LV Status";

/// Fields scraped from `lvdisplay` output. `None` means the label was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LvDisplay {
    pub path: Option<String>,
    pub status: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Field `{label}` has no value on line {line}: {text:?}")]
    MissingValue { label: &'static str, line: usize, text: String },
}

pub fn parse_lv_display(output: &str) -> Result<LvDisplay, ParseError> {
    let mut display = LvDisplay::default();

    for (idx, line) in output.lines().enumerate() {
        if line.contains(LV_PATH_LABEL) {
            display.path = Some(field_value(line, LV_PATH_LABEL, idx + 1)?);
        }
        if line.contains(LV_STATUS_LABEL) {
            display.status = Some(field_value(line, LV_STATUS_LABEL, idx + 1)?);
        }
    }

    Ok(display)
}

/// First whitespace-delimited token following the label.
fn field_value(line: &str, label: &'static str, line_no: usize) -> Result<String, ParseError> {
    line.split_once(label)
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .map(str::to_string)
        .ok_or_else(|| ParseError::MissingValue { label, line: line_no, text: line.to_string() })
}
