fn main() {
    if let Err(err) = matflow::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
