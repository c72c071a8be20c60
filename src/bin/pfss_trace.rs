//! Command line runner for the `pfss_trace` library.

#[cfg(not(feature = "for-testing"))]
#[quit::main]
fn main() {
    #[cfg(feature = "cli")]
    pfss_trace::cli::run::run();
}

#[cfg(feature = "for-testing")]
fn main() {
    #[cfg(feature = "cli")]
    {
        eprintln!(
            "Warning: The `for-testing` feature is enabled, which will clutter error messages\n\
             Tip: Use cargo flag --features=all-non-testing to include all features except `for-testing`"
        );
        pfss_trace::cli::run::run();
    }
}
