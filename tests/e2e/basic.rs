use crate::*;

#[test]
fn missing_manifest() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.run(&mut girder_command(vec![]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "build.girder");
    Ok(())
}

#[cfg(unix)]
#[test]
fn basic_build() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            "
project app
  type = application
  tool = copy
  source = src/main.c
",
        ]
        .join("\n"),
    )?;
    space.write("src/main.c", "hello\n")?;

    let out = space.run_expect(&mut girder_command(vec![]))?;
    assert_output_contains(&out, "ran 2 steps");
    assert_eq!(space.read("out/app")?, b"hello\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn second_run_does_nothing() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            "
project app
  type = application
  tool = copy
  source = main.c
",
        ]
        .join("\n"),
    )?;
    space.write("main.c", "x\n")?;

    space.run_expect(&mut girder_command(vec![]))?;
    let out = space.run_expect(&mut girder_command(vec![]))?;
    assert_output_contains(&out, "no work to do");
    Ok(())
}

#[test]
fn parse_error_names_location() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.girder", "tool\n")?;
    let out = space.run(&mut girder_command(vec![]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "parse error");
    assert_output_contains(&out, "build.girder:1");
    Ok(())
}

#[cfg(unix)]
#[test]
fn unknown_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            "
project app
  type = application
  tool = copy
  source = main.c
",
        ]
        .join("\n"),
    )?;
    space.write("main.c", "")?;
    let out = space.run(&mut girder_command(vec!["nope"]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "unknown project \"nope\"");
    Ok(())
}

#[cfg(unix)]
#[test]
fn specify_manifest_file() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "other.girder",
        &[
            COPY_TOOL,
            "
project app
  type = application
  tool = copy
  source = main.c
",
        ]
        .join("\n"),
    )?;
    space.write("main.c", "y\n")?;
    space.run_expect(&mut girder_command(vec!["-f", "other.girder"]))?;
    assert_eq!(space.read("out/app")?, b"y\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn show_commands_echoes_tool_invocations() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            "
project app
  type = application
  tool = copy
  source = main.c
",
        ]
        .join("\n"),
    )?;
    space.write("main.c", "")?;
    let out = space.run_expect(&mut girder_command(vec!["--show-commands"]))?;
    assert_output_contains(&out, "CMD: cp main.c");
    Ok(())
}

#[cfg(unix)]
#[test]
fn quiet_hides_step_announcements() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            "
project app
  type = application
  tool = copy
  source = main.c
",
        ]
        .join("\n"),
    )?;
    space.write("main.c", "")?;
    let out = space.run_expect(&mut girder_command(vec!["-q"]))?;
    assert_output_not_contains(&out, "Compiling");
    assert_output_not_contains(&out, "Linking");
    // The status line survives quiet mode.
    assert_output_contains(&out, "ran 2 steps");
    Ok(())
}

#[cfg(unix)]
#[test]
fn writes_chrome_trace() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            "
project app
  type = application
  tool = copy
  source = main.c
",
        ]
        .join("\n"),
    )?;
    space.write("main.c", "")?;
    space.run_expect(&mut girder_command(vec!["--trace", "trace.json"]))?;
    let trace = String::from_utf8(space.read("trace.json")?)?;
    assert!(trace.starts_with('['));
    assert!(trace.contains("\"ph\": \"X\""));
    assert!(trace.contains("work.run"));
    Ok(())
}
