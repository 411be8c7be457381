fn main() {
    #[cfg(feature = "cli")]
    hdelta::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("hdelta: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
