fn main() {
    if let Err(err) = table_recon::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
