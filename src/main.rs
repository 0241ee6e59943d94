fn main() {
    if let Err(err) = avance_dashboard::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
