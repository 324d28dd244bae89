//! Support code for e2e tests, which run girder as a binary.

mod basic;
mod deps;
mod incremental;

pub fn girder_binary() -> std::path::PathBuf {
    std::env::current_exe()
        .expect("test binary path")
        .parent()
        .expect("test binary directory")
        .parent()
        .expect("binary directory")
        .join("girder")
}

pub fn girder_command(args: Vec<&str>) -> std::process::Command {
    let mut cmd = std::process::Command::new(girder_binary());
    cmd.args(args);
    cmd
}

fn print_output(out: &std::process::Output) {
    // Gross: use print! instead of writing to stdout so Rust test
    // framework can capture it.
    print!("{}", std::str::from_utf8(&out.stdout).unwrap());
    print!("{}", std::str::from_utf8(&out.stderr).unwrap());
}

pub fn assert_output_contains(out: &std::process::Output, text: &str) {
    let out = std::str::from_utf8(&out.stdout).unwrap();
    if !out.contains(text) {
        panic!(
            "assertion failed; expected output to contain {:?} but got:\n{}",
            text, out
        );
    }
}

pub fn assert_output_not_contains(out: &std::process::Output, text: &str) {
    let out = std::str::from_utf8(&out.stdout).unwrap();
    if out.contains(text) {
        panic!(
            "assertion failed; expected output to not contain {:?} but got:\n{}",
            text, out
        );
    }
}

/// Manages a temporary directory for invoking girder.
pub struct TestSpace {
    dir: tempfile::TempDir,
}
impl TestSpace {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        Ok(TestSpace { dir })
    }

    /// Write a file into the working space, creating parent directories.
    pub fn write(&self, path: &str, content: &str) -> std::io::Result<()> {
        let path = self.dir.path().join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }

    /// Read a file from the working space.
    pub fn read(&self, path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.dir.path().join(path))
    }

    pub fn metadata(&self, path: &str) -> std::io::Result<std::fs::Metadata> {
        std::fs::metadata(self.dir.path().join(path))
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Push a file's mtime into the future, so it is unambiguously newer
    /// than everything built so far.
    pub fn bump_mtime(&self, path: &str) -> anyhow::Result<()> {
        let path = self.dir.path().join(path);
        let future = std::time::SystemTime::now() + std::time::Duration::from_secs(10);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(future))?;
        Ok(())
    }

    /// Invoke girder, returning process output.
    pub fn run(&self, cmd: &mut std::process::Command) -> std::io::Result<std::process::Output> {
        cmd.current_dir(self.dir.path()).output()
    }

    /// Like run, but also print output if the build failed.
    pub fn run_expect(
        &self,
        cmd: &mut std::process::Command,
    ) -> anyhow::Result<std::process::Output> {
        let out = self.run(cmd)?;
        if !out.status.success() {
            print_output(&out);
            anyhow::bail!("build failed, status {}", out.status);
        }
        Ok(out)
    }

    /// Persist the temp dir locally and abort the test.  Debugging helper.
    #[allow(dead_code)]
    pub fn eject(self) -> ! {
        panic!("ejected at {:?}", self.dir.into_path());
    }
}

/// A tool whose "compiler" copies the source and whose "linker"
/// concatenates the objects, so tests can assert on output bytes.
#[cfg(unix)]
pub const COPY_TOOL: &str = "
tool copy
  compile = cp $in $out
  link = cat $in > $out
  src = .c
  obj = .o
";

/// A tool whose compile step always fails.
#[cfg(unix)]
pub const BROKEN_TOOL: &str = "
tool broken
  compile = false
  link = cat $in > $out
  src = .c
  obj = .o
";
