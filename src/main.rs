fn main() {
    let code = girder::run();
    if code != 0 {
        std::process::exit(code);
    }
}
