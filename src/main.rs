fn main() {
    if let Err(err) = sheet_consolidator::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
