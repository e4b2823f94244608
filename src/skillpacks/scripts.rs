//! Script execution for skill packs.
//!
//! Scripts run as child processes with the package root as working
//! directory. Output is drained while the child runs, the wall-clock timeout
//! and an external cancellation token both kill the whole process tree.

use super::error::SkillError;
use super::index::{Catalog, Package};
use super::policy::resolve_within;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT_MS: i64 = 30_000;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
pub const MAX_SCRIPT_ARGS: usize = 64;

/// Key used in configuration for the fallback interpreter.
pub const FALLBACK_KEY: &str = "*";

/// Timeout in milliseconds to an optional bound; non-positive disables it.
pub fn timeout_from_millis(ms: i64) -> Option<Duration> {
    u64::try_from(ms)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Extension → interpreter command, plus a fallback for everything else.
///
/// The script path is appended after the template, then the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterTable {
    by_extension: BTreeMap<String, Vec<String>>,
    fallback: Vec<String>,
}

impl Default for InterpreterTable {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl InterpreterTable {
    /// Table for the host platform.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else {
            Self::unix()
        }
    }

    /// Every script runs under the POSIX shell.
    pub fn unix() -> Self {
        Self {
            by_extension: BTreeMap::new(),
            fallback: vec!["sh".to_string()],
        }
    }

    pub fn windows() -> Self {
        let powershell: Vec<String> = ["powershell", "-NoProfile", "-ExecutionPolicy", "Bypass", "-File"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cmd: Vec<String> = vec!["cmd".to_string(), "/C".to_string()];

        let mut by_extension = BTreeMap::new();
        by_extension.insert("ps1".to_string(), powershell.clone());
        by_extension.insert("bat".to_string(), cmd.clone());
        by_extension.insert("cmd".to_string(), cmd);
        Self {
            by_extension,
            fallback: powershell,
        }
    }

    /// Add or replace the interpreter for `extension` (`"*"` sets the
    /// fallback). The template is split with shell-word rules.
    pub fn set(&mut self, extension: &str, template: &str) -> Result<(), SkillError> {
        let argv = shell_words::split(template).map_err(|e| {
            SkillError::InvalidConfig(format!("interpreter for '{}': {}", extension, e))
        })?;
        if argv.is_empty() {
            return Err(SkillError::InvalidConfig(format!(
                "interpreter for '{}' is empty",
                extension
            )));
        }
        let key = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        if key == FALLBACK_KEY {
            self.fallback = argv;
        } else {
            self.by_extension.insert(key, argv);
        }
        Ok(())
    }

    /// Platform table with configured overrides applied.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, SkillError> {
        let mut table = Self::platform_default();
        for (extension, template) in overrides {
            table.set(extension, template)?;
        }
        Ok(table)
    }

    /// Interpreter argv for `script`.
    pub fn command_for(&self, script: &Path) -> &[String] {
        script
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.by_extension.get(&e.to_ascii_lowercase()))
            .unwrap_or(&self.fallback)
    }
}

/// Captured result of a script that exited successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Either stream hit the output cap
    pub truncated: bool,
}

impl ScriptOutput {
    /// Trimmed standard output, or standard error when a script wrote
    /// nothing else.
    pub fn text(&self) -> &str {
        let stdout = self.stdout.trim();
        if stdout.is_empty() {
            self.stderr.trim()
        } else {
            stdout
        }
    }
}

/// Runs package scripts with a fixed interpreter table and output cap.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreters: InterpreterTable,
    max_output_bytes: usize,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(InterpreterTable::platform_default())
    }
}

/// How long pipes may stay open after the script itself exited.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

#[derive(Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn into_text(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl ScriptRunner {
    pub fn new(interpreters: InterpreterTable) -> Self {
        Self {
            interpreters,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    pub fn interpreters(&self) -> &InterpreterTable {
        &self.interpreters
    }

    /// Run a script of the named package in `catalog`.
    pub async fn run_in(
        &self,
        catalog: &Catalog,
        package: &str,
        script: &str,
        args: &[String],
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ScriptOutput, SkillError> {
        let pkg = catalog.get(package).ok_or_else(|| SkillError::PackageNotFound {
            name: package.to_string(),
        })?;
        self.run(pkg, script, args, timeout, cancel).await
    }

    /// Run `script` from `package` with `args`.
    ///
    /// `timeout` of `None` means no bound. Cancelling `cancel` kills the
    /// child and returns [`SkillError::ScriptCancelled`].
    pub async fn run(
        &self,
        package: &Package,
        script: &str,
        args: &[String],
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ScriptOutput, SkillError> {
        let not_found = || SkillError::ScriptNotFound {
            package: package.name.clone(),
            script: script.to_string(),
        };
        let (script_name, declared) = package.script(script).ok_or_else(not_found)?;
        validate_args(args)?;

        // Re-check containment: the file may have been removed or replaced
        let rel = declared
            .strip_prefix(&package.source_path)
            .map_err(|_| not_found())?;
        let path = match resolve_within(&package.source_path, rel, &rel.to_string_lossy()) {
            Ok(path) => path,
            // escapes are logged by resolve_within; callers only see "not found"
            Err(SkillError::ResourceNotFound { .. }) => return Err(not_found()),
            Err(e) if e.is_security_rejection() => return Err(not_found()),
            Err(e) => return Err(e),
        };

        let argv = self.interpreters.command_for(&path);
        let (program, prefix) = argv
            .split_first()
            .ok_or_else(|| SkillError::InvalidConfig("empty interpreter".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(prefix)
            .arg(&path)
            .args(args)
            .current_dir(&package.source_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(
            package = %package.name,
            script = %script_name,
            command = %command_line(argv, &path, args),
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "spawning skill script"
        );

        let mut child = cmd.spawn().map_err(|e| SkillError::io(&path, e))?;
        let pid = child.id();

        let mut stdout = Captured::default();
        let mut stderr = Captured::default();
        let limit = self.max_output_bytes;
        let (out_pipe, err_pipe) = (child.stdout.take(), child.stderr.take());
        let mut readers = Box::pin(async {
            let (out, err) = tokio::join!(
                capture(out_pipe, limit, &mut stdout),
                capture(err_pipe, limit, &mut stderr)
            );
            out.and(err)
        });
        let mut drained = false;

        let outcome = tokio::select! {
            res = wait_for_exit(&mut child, readers.as_mut(), &mut drained) => Outcome::Exited(res),
            () = deadline(timeout) => Outcome::TimedOut,
            () = cancel.cancelled() => Outcome::Cancelled,
        };

        let status = match outcome {
            Outcome::TimedOut => {
                terminate(&mut child, pid).await;
                let timeout_ms = timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
                warn!(package = %package.name, script = %script_name, timeout_ms, "skill script timed out");
                return Err(SkillError::ScriptTimeout {
                    package: package.name.clone(),
                    script: script_name.to_string(),
                    timeout_ms,
                });
            }
            Outcome::Cancelled => {
                terminate(&mut child, pid).await;
                info!(package = %package.name, script = %script_name, "skill script cancelled");
                return Err(SkillError::ScriptCancelled {
                    package: package.name.clone(),
                    script: script_name.to_string(),
                });
            }
            Outcome::Exited(Err(e)) => {
                terminate(&mut child, pid).await;
                return Err(SkillError::io(&path, e));
            }
            Outcome::Exited(Ok(status)) => status,
        };

        // The script is gone, but a background child may still hold its pipes
        if !drained {
            match tokio::time::timeout(DRAIN_GRACE, readers.as_mut()).await {
                Ok(res) => res.map_err(|e| SkillError::io(&path, e))?,
                Err(_) => {
                    debug!(
                        package = %package.name,
                        script = %script_name,
                        "output pipes still open after exit, killing process group"
                    );
                    kill_tree(pid).await;
                    let _ = tokio::time::timeout(DRAIN_GRACE, readers.as_mut()).await;
                }
            }
        }
        drop(readers);

        let truncated = stdout.truncated || stderr.truncated;
        let (stdout, stderr) = (stdout.into_text(), stderr.into_text());
        if truncated {
            warn!(package = %package.name, script = %script_name, "skill script output truncated");
        }
        if !status.success() {
            warn!(
                package = %package.name,
                script = %script_name,
                exit_code = ?status.code(),
                "skill script failed"
            );
            return Err(SkillError::ScriptFailed {
                package: package.name.clone(),
                script: script_name.to_string(),
                exit_code: status.code(),
                stderr,
            });
        }
        if !stderr.trim().is_empty() {
            warn!(
                package = %package.name,
                script = %script_name,
                stderr = %stderr.trim_end(),
                "skill script succeeded with error output"
            );
        }
        debug!(
            package = %package.name,
            script = %script_name,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "skill script finished"
        );
        Ok(ScriptOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or_default(),
            truncated,
        })
    }
}

fn validate_args(args: &[String]) -> Result<(), SkillError> {
    if args.len() > MAX_SCRIPT_ARGS {
        return Err(SkillError::InvalidArgument(format!(
            "too many script arguments (max {})",
            MAX_SCRIPT_ARGS
        )));
    }
    if let Some(idx) = args.iter().position(|a| a.contains('\0')) {
        return Err(SkillError::InvalidArgument(format!(
            "script argument {} contains a NUL byte",
            idx
        )));
    }
    Ok(())
}

fn command_line(argv: &[String], script: &Path, args: &[String]) -> String {
    let script = script.to_string_lossy();
    let words = argv
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(script.as_ref()))
        .chain(args.iter().map(String::as_str));
    shell_words::join(words)
}

/// Wait for the child to exit, polling the pipe readers alongside so a full
/// pipe never blocks it. Sets `drained` once both pipes reached EOF.
async fn wait_for_exit<F>(
    child: &mut Child,
    mut readers: Pin<&mut F>,
    drained: &mut bool,
) -> std::io::Result<ExitStatus>
where
    F: Future<Output = std::io::Result<()>>,
{
    loop {
        tokio::select! {
            res = readers.as_mut(), if !*drained => {
                res?;
                *drained = true;
            }
            status = child.wait() => return status,
        }
    }
}

async fn capture<R: AsyncRead + Unpin>(
    reader: Option<R>,
    limit: usize,
    into: &mut Captured,
) -> std::io::Result<()> {
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        // Keep reading past the cap so the child never blocks on a full pipe
        let room = limit.saturating_sub(into.bytes.len());
        if n > room {
            into.truncated = true;
        }
        into.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Kill the child's process group (its whole tree on Windows).
async fn kill_tree(pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            debug!(pid, error = %e, "killpg failed");
        }
    }
    #[cfg(windows)]
    if let Some(pid) = pid {
        let _ = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
    }
    #[cfg(not(any(unix, windows)))]
    let _ = pid;
}

/// Kill the child and everything it spawned, then reap it.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_tree(pid).await;
    let _ = child.start_kill();
    let _ = child.wait().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skillpacks::index::load_package;
    use crate::skillpacks::policy::ResourcePolicy;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    fn package_with(scripts: &[(&str, &str)]) -> (TempDir, Package) {
        let td = TempDir::new().unwrap();
        let dir = td.path().join("tools");
        fs::create_dir_all(dir.join("scripts")).unwrap();
        fs::write(
            dir.join("SKILL.md"),
            "---\nname: tools\ndescription: test scripts\n---\nRun the scripts.\n",
        )
        .unwrap();
        for (file, content) in scripts {
            fs::write(dir.join("scripts").join(file), content).unwrap();
        }
        let package = load_package(&dir, &ResourcePolicy::permissive()).unwrap();
        (td, package)
    }

    fn runner() -> ScriptRunner {
        ScriptRunner::new(InterpreterTable::unix())
    }

    #[test]
    fn test_timeout_from_millis() {
        assert_eq!(timeout_from_millis(1500), Some(Duration::from_millis(1500)));
        assert_eq!(timeout_from_millis(0), None);
        assert_eq!(timeout_from_millis(-5), None);
    }

    #[test]
    fn test_interpreter_table() {
        let table = InterpreterTable::windows();
        assert_eq!(table.command_for(Path::new("a.BAT")), ["cmd", "/C"]);
        assert_eq!(table.command_for(Path::new("a.ps1"))[0], "powershell");
        assert_eq!(table.command_for(Path::new("a.unknown"))[0], "powershell");

        let mut overrides = BTreeMap::new();
        overrides.insert(".py".to_string(), "python3 -u".to_string());
        overrides.insert("*".to_string(), "bash --noprofile".to_string());
        let mut table = InterpreterTable::unix();
        for (ext, template) in &overrides {
            table.set(ext, template).unwrap();
        }
        assert_eq!(table.command_for(Path::new("x.py")), ["python3", "-u"]);
        assert_eq!(table.command_for(Path::new("x.sh")), ["bash", "--noprofile"]);

        assert!(table.set("rb", "ruby 'unterminated").is_err());
        assert!(table.set("rb", "   ").is_err());
    }

    #[test]
    fn test_output_text_falls_back_to_stderr() {
        let out = ScriptOutput {
            stdout: "\n".to_string(),
            stderr: "result on stderr\n".to_string(),
            exit_code: 0,
            truncated: false,
        };
        assert_eq!(out.text(), "result on stderr");

        let out = ScriptOutput {
            stdout: "\n  pong \r\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
            truncated: false,
        };
        assert_eq!(out.text(), "pong");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ping_returns_pong() {
        let (_td, package) = package_with(&[("ping.sh", "echo pong\n")]);
        let out = runner()
            .run(
                &package,
                "ping",
                &[],
                timeout_from_millis(DEFAULT_TIMEOUT_MS),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.text(), "pong");
        assert_eq!(out.exit_code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_args_are_not_reinterpreted() {
        let (_td, package) = package_with(&[(
            "echo.sh",
            "for a in \"$@\"; do printf '[%s]\\n' \"$a\"; done\n",
        )]);
        let args = vec![
            "two words".to_string(),
            "$(rm -rf /)".to_string(),
            "semi;colon".to_string(),
            "'quoted'".to_string(),
        ];
        let out = runner()
            .run(&package, "echo", &args, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            out.stdout,
            "[two words]\n[$(rm -rf /)]\n[semi;colon]\n['quoted']\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let (_td, package) = package_with(&[("fail.sh", "echo oops >&2\nexit 3\n")]);
        let err = runner()
            .run(&package, "fail", &[], None, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            SkillError::ScriptFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr.trim(), "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_script() {
        let (_td, package) = package_with(&[("slow.sh", "sleep 30\necho done\n")]);
        let started = Instant::now();
        let err = runner()
            .run(
                &package,
                "slow",
                &[],
                Some(Duration::from_millis(200)),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SkillError::ScriptTimeout {
                timeout_ms: 200,
                ..
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_background_children() {
        // The backgrounded sleep keeps stdout open; only a group kill ends it
        let (_td, package) = package_with(&[("spawn.sh", "sleep 30 &\nsleep 30\n")]);
        let started = Instant::now();
        let err = runner()
            .run(
                &package,
                "spawn",
                &[],
                Some(Duration::from_millis(200)),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::ScriptTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_script() {
        let (_td, package) = package_with(&[("slow.sh", "sleep 30\n")]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let err = runner()
            .run(&package, "slow", &[], None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::ScriptCancelled { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_output_does_not_deadlock() {
        let (_td, package) = package_with(&[(
            "flood.sh",
            "i=0\nwhile [ $i -lt 20000 ]; do echo 'xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx'; echo 'yyyy' >&2; i=$((i+1)); done\n",
        )]);
        let out = runner()
            .with_max_output_bytes(1024)
            .run(
                &package,
                "flood",
                &[],
                Some(Duration::from_secs(60)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(out.truncated);
        assert_eq!(out.stdout.len(), 1024);
    }

    #[tokio::test]
    async fn test_unknown_and_removed_scripts() {
        let (td, package) = package_with(&[("gone.sh", "echo hi\n")]);
        let cancel = CancellationToken::new();
        assert!(matches!(
            runner().run(&package, "nope", &[], None, &cancel).await,
            Err(SkillError::ScriptNotFound { .. })
        ));

        fs::remove_file(td.path().join("tools/scripts/gone.sh")).unwrap();
        assert!(matches!(
            runner().run(&package, "gone", &[], None, &cancel).await,
            Err(SkillError::ScriptNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_bad_arguments() {
        let (_td, package) = package_with(&[("ok.sh", "echo ok\n")]);
        let cancel = CancellationToken::new();
        let nul = vec!["a\0b".to_string()];
        assert!(matches!(
            runner().run(&package, "ok", &nul, None, &cancel).await,
            Err(SkillError::InvalidArgument(_))
        ));
        let many = vec!["x".to_string(); MAX_SCRIPT_ARGS + 1];
        assert!(matches!(
            runner().run(&package, "ok", &many, None, &cancel).await,
            Err(SkillError::InvalidArgument(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_background_child_does_not_block_success() {
        let (_td, package) = package_with(&[("bg.sh", "sleep 3 &\necho done\n")]);
        for timeout in [Some(Duration::from_secs(5)), None] {
            let started = Instant::now();
            let out = runner()
                .run(&package, "bg", &[], timeout, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(out.text(), "done");
            assert_eq!(out.exit_code, 0);
            assert!(started.elapsed() < Duration::from_millis(2500));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_escaping_script_symlink_reads_as_missing() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("evil.sh"), "echo pwned\n").unwrap();

        let (_td, package) = package_with(&[("ok.sh", "echo ok\n")]);
        std::os::unix::fs::symlink(
            outside.path().join("evil.sh"),
            package.source_path.join("scripts/evil.sh"),
        )
        .unwrap();
        let package = load_package(&package.source_path, &ResourcePolicy::permissive()).unwrap();
        assert!(package.script("evil").is_some());

        let cancel = CancellationToken::new();
        let escaped = runner()
            .run(&package, "evil", &[], None, &cancel)
            .await
            .unwrap_err();
        let missing = runner()
            .run(&package, "absent", &[], None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(escaped, SkillError::ScriptNotFound { .. }));
        assert_eq!(
            escaped.public_message().replace("evil", "absent"),
            missing.public_message()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let (_td, package) = package_with(&[(
            "echo.sh",
            "sleep 0.2\necho \"out-$1\"\necho \"err-$1\" >&2\n",
        )]);
        let runner = runner();
        let cancel = CancellationToken::new();
        let args: Vec<Vec<String>> = (0..4).map(|i| vec![i.to_string()]).collect();

        let (a, b, c, d) = tokio::join!(
            runner.run(&package, "echo", &args[0], None, &cancel),
            runner.run(&package, "echo", &args[1], None, &cancel),
            runner.run(&package, "echo", &args[2], None, &cancel),
            runner.run(&package, "echo", &args[3], None, &cancel),
        );
        for (i, out) in [a, b, c, d].into_iter().enumerate() {
            let out = out.unwrap();
            assert_eq!(out.stdout, format!("out-{}\n", i));
            assert_eq!(out.stderr, format!("err-{}\n", i));
        }
    }
}
