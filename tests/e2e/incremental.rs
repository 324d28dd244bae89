use crate::*;

#[cfg(unix)]
const TWO_SOURCE_LIB: &str = "
project lib
  type = static
  tool = copy
  source = a.c
  source = b.c
";

#[cfg(unix)]
#[test]
fn touched_source_rebuilds_and_propagates() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.girder", &[COPY_TOOL, TWO_SOURCE_LIB].join("\n"))?;
    space.write("a.c", "A\n")?;
    space.write("b.c", "B\n")?;

    space.run_expect(&mut girder_command(vec![]))?;
    assert_eq!(space.read("out/liblib.a")?, b"A\nB\n");

    space.write("a.c", "A2\n")?;
    space.bump_mtime("a.c")?;

    let out = space.run_expect(&mut girder_command(vec![]))?;
    assert_output_not_contains(&out, "no work to do");
    assert_eq!(space.read("out/liblib.a")?, b"A2\nB\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn untouched_sources_are_skipped() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.girder", &[COPY_TOOL, TWO_SOURCE_LIB].join("\n"))?;
    space.write("a.c", "A\n")?;
    space.write("b.c", "B\n")?;

    space.run_expect(&mut girder_command(vec![]))?;

    space.bump_mtime("a.c")?;
    let out = space.run_expect(&mut girder_command(vec!["-v"]))?;
    // Only a.c recompiles; b.c's object is still newer than its source.
    assert_output_contains(&out, "up to date: lib: b.c");
    assert_output_contains(&out, "ran 2 steps");
    Ok(())
}

#[cfg(unix)]
#[test]
fn deleted_output_is_rebuilt() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.girder", &[COPY_TOOL, TWO_SOURCE_LIB].join("\n"))?;
    space.write("a.c", "A\n")?;
    space.write("b.c", "B\n")?;

    space.run_expect(&mut girder_command(vec![]))?;
    std::fs::remove_file(space.path().join("out/liblib.a"))?;

    let out = space.run_expect(&mut girder_command(vec![]))?;
    assert_output_not_contains(&out, "no work to do");
    assert_eq!(space.read("out/liblib.a")?, b"A\nB\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn rebuilds_only_downstream_of_dependency_change() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.girder",
        &[
            COPY_TOOL,
            "
project lib
  type = static
  tool = copy
  source = a.c

project app
  type = application
  tool = copy
  deps = lib
  source = main.c
",
        ]
        .join("\n"),
    )?;
    space.write("a.c", "A\n")?;
    space.write("main.c", "M\n")?;

    space.run_expect(&mut girder_command(vec![]))?;
    assert_eq!(space.read("out/app")?, b"M\nA\n");

    space.write("a.c", "A2\n")?;
    space.bump_mtime("a.c")?;
    let out = space.run_expect(&mut girder_command(vec!["-v"]))?;
    // main.c did not change, so its object is reused.
    assert_output_contains(&out, "up to date: app: main.c");
    assert_eq!(space.read("out/app")?, b"M\nA2\n");
    Ok(())
}
