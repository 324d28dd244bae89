use crate::*;

#[cfg(unix)]
const LIB_AND_APP: &str = "
project lib
  type = static
  tool = copy
  source = a.c
  source = b.c

project app
  type = application
  tool = copy
  deps = lib
  source = main.c
";

/// The app's link consumes its own objects first, then the dependency's
/// archive, so the concatenated bytes pin down both the ordering and the
/// fan-in wiring.
#[cfg(unix)]
#[test]
fn links_own_objects_then_dependency_output() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.girder", &[COPY_TOOL, LIB_AND_APP].join("\n"))?;
    space.write("a.c", "A\n")?;
    space.write("b.c", "B\n")?;
    space.write("main.c", "M\n")?;

    let out = space.run_expect(&mut girder_command(vec!["-j", "4"]))?;
    assert_output_contains(&out, "ran 5 steps");
    assert_eq!(space.read("out/liblib.a")?, b"A\nB\n");
    assert_eq!(space.read("out/app")?, b"M\nA\nB\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn failure_skips_dependents_not_siblings() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            BROKEN_TOOL,
            "
project bad
  type = static
  tool = broken
  source = x.c

project app
  type = application
  tool = copy
  deps = bad
  source = main.c

project side
  type = application
  tool = copy
  source = other.c
",
        ]
        .join("\n"),
    )?;
    space.write("x.c", "")?;
    space.write("main.c", "M\n")?;
    space.write("other.c", "S\n")?;

    let out = space.run(&mut girder_command(vec![]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "build failed: bad: x.c");
    // The unrelated project still built to completion.
    assert_eq!(space.read("out/side")?, b"S\n");
    // Nothing downstream of the failure was linked.
    assert!(space.read("out/app").is_err());
    Ok(())
}

#[cfg(unix)]
#[test]
fn target_selection_builds_only_the_closure() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            "
project core
  type = static
  tool = copy
  source = c.c

project app
  type = application
  tool = copy
  deps = core
  source = main.c

project other
  type = application
  tool = copy
  source = o.c
",
        ]
        .join("\n"),
    )?;
    space.write("c.c", "C\n")?;
    space.write("main.c", "M\n")?;
    space.write("o.c", "O\n")?;

    space.run_expect(&mut girder_command(vec!["app"]))?;
    assert!(space.read("out/app").is_ok());
    assert!(space.read("out/libcore.a").is_ok());
    assert!(space.read("out/other").is_err());
    Ok(())
}

#[cfg(unix)]
#[test]
fn dependency_cycle_is_a_configuration_error() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            "
project a
  type = static
  tool = copy
  deps = b
  source = a.c

project b
  type = static
  tool = copy
  deps = a
  source = b.c
",
        ]
        .join("\n"),
    )?;
    space.write("a.c", "")?;
    space.write("b.c", "")?;

    let out = space.run(&mut girder_command(vec![]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "dependency cycle");
    // Nothing ran.
    assert!(space.read("out/liba.a").is_err());
    assert!(space.read("out/libb.a").is_err());
    Ok(())
}

#[cfg(unix)]
#[test]
fn missing_tool_program_skips_subtree() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            "
tool ghost
  compile = no-such-compiler-exists -c $in -o $out
  link = no-such-compiler-exists $in -o $out
  src = .c
  obj = .o
",
            "
project needsghost
  type = application
  tool = ghost
  source = g.c

project fine
  type = application
  tool = copy
  source = f.c
",
        ]
        .join("\n"),
    )?;
    space.write("g.c", "")?;
    space.write("f.c", "F\n")?;

    let out = space.run(&mut girder_command(vec![]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "no-such-compiler-exists");
    assert_eq!(space.read("out/fine")?, b"F\n");
    assert!(space.read("out/needsghost").is_err());
    Ok(())
}
