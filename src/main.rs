fn main() {
    if let Err(err) = tilemark::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
