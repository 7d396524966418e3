//! A fake node binary backed by a shell script and a state directory.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
STATE='@STATE@'
echo "$*" >> "$STATE/invocations.log"

case "$1 $2" in
"node create")
    echo $$ > "$STATE/node.pid"
    echo running > "$STATE/status"
    echo "2024-01-01T00:00:00 INFO node started"
    echo "2024-01-01T00:00:00 TRACE dropped by level"
    echo "not a log line"
    echo "2024-01-01T00:00:01 WARN broker slow to answer" >&2
    if [ -f "$STATE/crash_code" ]; then
        echo stopped > "$STATE/status"
        exit "$(cat "$STATE/crash_code")"
    fi
    trap 'echo stopped > "$STATE/status"; exit 0' TERM
    while :; do
        sleep 1 >/dev/null 2>&1 &
        wait $!
    done
    ;;
"node delete")
    if [ -f "$STATE/node.pid" ]; then
        kill "$(cat "$STATE/node.pid")" 2>/dev/null
    fi
    echo stopped > "$STATE/status"
    ;;
"node show")
    if [ -f "$STATE/show.json" ]; then
        cat "$STATE/show.json"
    elif [ -f "$STATE/status" ]; then
        printf '{"name":"%s","status":"%s"}\n' "$3" "$(cat "$STATE/status")"
    else
        echo "node $3 not found" >&2
        exit 1
    fi
    ;;
"node list")
    if [ -f "$STATE/list.json" ]; then
        cat "$STATE/list.json"
    else
        echo '[]'
    fi
    ;;
"identity create")
    printf '\n  I%s0001  \n' "$3"
    ;;
*)
    echo "unsupported command: $*" >&2
    exit 2
    ;;
esac
"#;

/// A scriptable stand-in for the node binary.
///
/// State lives in a temporary directory that is removed on drop.
pub struct FakeNodeBinary {
    dir: TempDir,
    path: PathBuf,
}

impl FakeNodeBinary {
    /// Install a fake whose nodes run until deleted or killed.
    pub fn install() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ockam");

        let state = dir.path().to_string_lossy().replace('\'', r"'\''");
        fs::write(&path, SCRIPT.replace("@STATE@", &state))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;

        Ok(Self { dir, path })
    }

    /// Install a fake whose nodes exit with `code` right after starting.
    pub fn crashing(code: i32) -> io::Result<Self> {
        let fake = Self::install()?;
        fs::write(fake.dir.path().join("crash_code"), code.to_string())?;
        Ok(fake)
    }

    /// Path to the fake binary.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the fake's state.
    pub fn state_dir(&self) -> &Path {
        self.dir.path()
    }

    /// All invocations so far, one argument string per call.
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("invocations.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Number of invocations starting with `prefix` (e.g. `"node delete"`).
    pub fn count(&self, prefix: &str) -> usize {
        self.invocations()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    /// Last status written by `node create` / `node delete`.
    pub fn status(&self) -> Option<String> {
        fs::read_to_string(self.dir.path().join("status"))
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Answer every `node show` with `json`.
    pub fn set_show_payload(&self, json: &str) -> io::Result<()> {
        fs::write(self.dir.path().join("show.json"), json)
    }

    /// Answer `node list` with `json`.
    pub fn set_list_payload(&self, json: &str) -> io::Result<()> {
        fs::write(self.dir.path().join("list.json"), json)
    }
}
