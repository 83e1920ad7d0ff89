fn main() {
    if let Err(err) = geogate_lib::run() {
        eprintln!("geogate: {err:#}");
        std::process::exit(1);
    }
}
