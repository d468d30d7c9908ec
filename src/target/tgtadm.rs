// tgtadm command lines and `--op show` parsing

use crate::exec::CommandLine;
use std::collections::BTreeMap;
use thiserror::Error;

fn tgtadm(op: &str, mode: &str) -> CommandLine {
    CommandLine::new("tgtadm").args(["--lld", "iscsi", "--op", op, "--mode", mode])
}

pub fn show_targets() -> CommandLine {
    tgtadm("show", "target")
}

pub fn new_target(tid: u32, iqn: &str) -> CommandLine {
    tgtadm("new", "target").arg("--tid").arg(tid.to_string()).args(["-T", iqn])
}

pub fn new_lun(tid: u32, lun: u32, path: &str) -> CommandLine {
    tgtadm("new", "logicalunit")
        .arg("--tid")
        .arg(tid.to_string())
        .arg("--lun")
        .arg(lun.to_string())
        .args(["-b", path])
}

pub fn delete_lun(tid: u32, lun: u32) -> CommandLine {
    tgtadm("delete", "logicalunit").arg("--tid").arg(tid.to_string()).arg("--lun").arg(lun.to_string())
}

pub fn bind_initiator(tid: u32, initiator: &str) -> CommandLine {
    tgtadm("bind", "target").arg("--tid").arg(tid.to_string()).args(["-I", initiator])
}

pub fn unbind_initiator(tid: u32, initiator: &str) -> CommandLine {
    tgtadm("unbind", "target").arg("--tid").arg(tid.to_string()).args(["-I", initiator])
}

/// One target as reported by `tgtadm --op show --mode target`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetInfo {
    pub tid: u32,
    pub iqn: String,
    /// LUN number to backing store path. LUNs without a device backing
    /// (the controller unit reports `None`) are left out.
    pub luns: BTreeMap<u32, String>,
    pub acl: Vec<String>,
}

impl TargetInfo {
    pub fn lun_for_path(&self, path: &str) -> Option<u32> {
        self.luns.iter().find(|(_, p)| p.as_str() == path).map(|(lun, _)| *lun)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShowParseError {
    #[error("Malformed target header on line {line}: {text:?}")]
    TargetHeader { line: usize, text: String },

    #[error("Malformed LUN number on line {line}: {text:?}")]
    LunNumber { line: usize, text: String },

    #[error("LUN entry outside of a target on line {line}")]
    Orphan { line: usize },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Other,
    Luns,
    Acl,
}

pub fn parse_show(output: &str) -> Result<Vec<TargetInfo>, ShowParseError> {
    let mut targets: Vec<TargetInfo> = Vec::new();
    let mut section = Section::Other;
    let mut current_lun: Option<u32> = None;

    for (idx, raw) in output.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("Target ") {
            let (tid, iqn) = rest
                .split_once(':')
                .and_then(|(tid, iqn)| Some((tid.trim().parse::<u32>().ok()?, iqn.trim())))
                .ok_or_else(|| ShowParseError::TargetHeader { line: line_no, text: raw.to_string() })?;
            targets.push(TargetInfo { tid, iqn: iqn.to_string(), ..Default::default() });
            section = Section::Other;
            current_lun = None;
            continue;
        }

        match line {
            "LUN information:" => {
                section = Section::Luns;
                continue;
            }
            "ACL information:" => {
                section = Section::Acl;
                continue;
            }
            _ if line.ends_with("information:") => {
                section = Section::Other;
                continue;
            }
            _ => {}
        }

        let target = targets.last_mut().ok_or(ShowParseError::Orphan { line: line_no })?;

        match section {
            Section::Luns => {
                if let Some(number) = line.strip_prefix("LUN:") {
                    let lun = number
                        .trim()
                        .parse::<u32>()
                        .map_err(|_| ShowParseError::LunNumber { line: line_no, text: raw.to_string() })?;
                    current_lun = Some(lun);
                } else if let Some(path) = line.strip_prefix("Backing store path:") {
                    let path = path.trim();
                    if let Some(lun) = current_lun
                        && !path.is_empty()
                        && path != "None"
                    {
                        target.luns.insert(lun, path.to_string());
                    }
                }
            }
            Section::Acl => target.acl.push(line.to_string()),
            Section::Other => {}
        }
    }

    Ok(targets)
}
