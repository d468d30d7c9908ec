// In-memory stand-in for a host running LVM and tgtd.
//
// Understands the command lines the driver emits and keeps just enough state
// to answer `lvdisplay` and `tgtadm --op show` the way the real tools do.

#![allow(dead_code)]

use async_trait::async_trait;
use lvm_csi::exec::{CommandLine, CommandRunner, ExecError, ExecResult};
use lvm_csi::lvm::VOLUME_GROUP;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct Target {
    tid: u32,
    iqn: String,
    luns: BTreeMap<u32, String>,
    acl: Vec<String>,
}

#[derive(Default)]
struct HostState {
    volumes: BTreeMap<String, String>,
    target: Option<Target>,
    history: Vec<String>,
}

#[derive(Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
    delay: Option<Duration>,
}

fn failed(command: &CommandLine, code: i32, stderr: &str) -> ExecError {
    ExecError::Failed { command: command.to_string(), code: Some(code), stderr: stderr.to_string() }
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter().position(|a| a == name).and_then(|i| args.get(i + 1)).map(String::as_str)
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tgtadm mutation sleeps for `delay`, widening race windows.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub fn history(&self) -> Vec<String> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn volumes(&self) -> Vec<String> {
        self.state.lock().unwrap().volumes.keys().cloned().collect()
    }

    pub fn luns(&self) -> BTreeMap<u32, String> {
        self.state.lock().unwrap().target.as_ref().map(|t| t.luns.clone()).unwrap_or_default()
    }

    pub fn acl(&self) -> Vec<String> {
        self.state.lock().unwrap().target.as_ref().map(|t| t.acl.clone()).unwrap_or_default()
    }

    pub fn has_target(&self) -> bool {
        self.state.lock().unwrap().target.is_some()
    }

    /// Map a LUN behind the driver's back.
    pub fn seed_lun(&self, tid: u32, iqn: &str, lun: u32, path: &str) {
        let mut state = self.state.lock().unwrap();
        let target =
            state.target.get_or_insert_with(|| Target { tid, iqn: iqn.to_string(), ..Target::default() });
        target.luns.insert(lun, path.to_string());
    }

    fn lvcreate(&self, command: &CommandLine) -> ExecResult<String> {
        let args = &command.args;
        let name = flag(args, "-n").ok_or_else(|| failed(command, 3, "Please specify a name"))?;
        let size = flag(args, "-L").ok_or_else(|| failed(command, 3, "Please specify a size"))?;
        if args.last().map(String::as_str) != Some(VOLUME_GROUP) {
            return Err(failed(command, 5, "Volume group not found"));
        }

        let mut state = self.state.lock().unwrap();
        if state.volumes.contains_key(name) {
            return Err(failed(
                command,
                5,
                &format!("Logical Volume \"{}\" already exists in volume group \"{}\"", name, VOLUME_GROUP),
            ));
        }
        state.volumes.insert(name.to_string(), size.to_string());
        Ok(format!("  Logical volume \"{}\" created.\n", name))
    }

    fn lvdisplay(&self, command: &CommandLine) -> ExecResult<String> {
        let target = command.args.first().map(String::as_str).unwrap_or(VOLUME_GROUP);
        let state = self.state.lock().unwrap();

        let render = |name: &str, size: &str| {
            format!(
                "  --- Logical volume ---\n  LV Path                /dev/{vg}/{name}\n  LV Name                {name}\n  VG Name                {vg}\n  LV Status              available\n  LV Size                {size}\n\n",
                vg = VOLUME_GROUP,
                name = name,
                size = size,
            )
        };

        if target == VOLUME_GROUP {
            return Ok(state.volumes.iter().map(|(n, s)| render(n, s)).collect());
        }

        let prefix = format!("/dev/{}/", VOLUME_GROUP);
        match target.strip_prefix(&prefix).and_then(|name| state.volumes.get_key_value(name)) {
            Some((name, size)) => Ok(render(name, size)),
            None => Err(failed(command, 5, &format!("Failed to find logical volume \"{}\"", target))),
        }
    }

    fn lvremove(&self, command: &CommandLine) -> ExecResult<String> {
        let path = command.args.last().map(String::as_str).unwrap_or_default();
        let prefix = format!("/dev/{}/", VOLUME_GROUP);
        let mut state = self.state.lock().unwrap();

        match path.strip_prefix(&prefix).and_then(|name| state.volumes.remove(name)) {
            Some(_) => Ok(format!("  Logical volume \"{}\" successfully removed\n", path)),
            None => Err(failed(command, 5, &format!("Failed to find logical volume \"{}\"", path))),
        }
    }

    fn show(state: &HostState) -> String {
        let Some(target) = &state.target else {
            return String::new();
        };

        let mut out = String::new();
        let _ = writeln!(out, "Target {}: {}", target.tid, target.iqn);
        out.push_str("    System information:\n        Driver: iscsi\n        State: ready\n");
        out.push_str("    I_T nexus information:\n    LUN information:\n");
        out.push_str("        LUN: 0\n            Type: controller\n            Backing store type: null\n            Backing store path: None\n");
        for (lun, path) in &target.luns {
            let _ = write!(
                out,
                "        LUN: {}\n            Type: disk\n            Backing store type: rdwr\n            Backing store path: {}\n",
                lun, path
            );
        }
        out.push_str("    Account information:\n    ACL information:\n");
        for initiator in &target.acl {
            let _ = writeln!(out, "        {}", initiator);
        }
        out
    }

    async fn tgtadm(&self, command: &CommandLine) -> ExecResult<String> {
        let args = &command.args;
        let op = flag(args, "--op").unwrap_or_default();
        let mode = flag(args, "--mode").unwrap_or_default();

        if op != "show"
            && let Some(delay) = self.delay
        {
            tokio::time::sleep(delay).await;
        }

        let tid = flag(args, "--tid").and_then(|t| t.parse::<u32>().ok());
        let mut state = self.state.lock().unwrap();

        match (op, mode) {
            ("show", "target") => Ok(Self::show(&state)),
            ("new", "target") => {
                if state.target.is_some() {
                    return Err(failed(command, 22, "tgtadm: this target already exists"));
                }
                let iqn = flag(args, "-T").unwrap_or_default();
                state.target = Some(Target { tid: tid.unwrap_or_default(), iqn: iqn.to_string(), ..Target::default() });
                Ok(String::new())
            }
            (op, mode) => {
                let target = state
                    .target
                    .as_mut()
                    .filter(|t| Some(t.tid) == tid)
                    .ok_or_else(|| failed(command, 22, "tgtadm: can't find the target"))?;

                match (op, mode) {
                    ("new", "logicalunit") => {
                        let lun = flag(args, "--lun").and_then(|l| l.parse::<u32>().ok()).unwrap_or_default();
                        if target.luns.contains_key(&lun) {
                            return Err(failed(command, 22, "tgtadm: this logical unit number already exists"));
                        }
                        target.luns.insert(lun, flag(args, "-b").unwrap_or_default().to_string());
                        Ok(String::new())
                    }
                    ("delete", "logicalunit") => {
                        let lun = flag(args, "--lun").and_then(|l| l.parse::<u32>().ok()).unwrap_or_default();
                        match target.luns.remove(&lun) {
                            Some(_) => Ok(String::new()),
                            None => Err(failed(command, 22, "tgtadm: can't find the logical unit")),
                        }
                    }
                    ("bind", "target") => {
                        let initiator = flag(args, "-I").unwrap_or_default().to_string();
                        if !target.acl.contains(&initiator) {
                            target.acl.push(initiator);
                        }
                        Ok(String::new())
                    }
                    ("unbind", "target") => {
                        let initiator = flag(args, "-I").unwrap_or_default();
                        target.acl.retain(|i| i != initiator);
                        Ok(String::new())
                    }
                    _ => Err(failed(command, 22, "tgtadm: unknown operation")),
                }
            }
        }
    }
}

#[async_trait]
impl CommandRunner for FakeHost {
    async fn run(&self, command: &CommandLine) -> ExecResult<String> {
        self.state.lock().unwrap().history.push(command.to_string());

        match command.program.as_str() {
            "lvcreate" => self.lvcreate(command),
            "lvdisplay" => self.lvdisplay(command),
            "lvremove" => self.lvremove(command),
            "tgtadm" => self.tgtadm(command).await,
            _ => Err(ExecError::Spawn {
                command: command.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            }),
        }
    }
}
