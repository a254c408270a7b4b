fn main() {
    let code = reconctl::cli::run();
    std::process::exit(code);
}
