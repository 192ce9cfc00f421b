fn main() {
    #[cfg(feature = "cli")]
    rvl_codec::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("rvl: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
