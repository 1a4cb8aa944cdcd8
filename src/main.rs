fn main() -> anyhow::Result<()> {
    if let Some(arg) = std::env::args().nth(1) {
        if arg == "-h" || arg == "--help" {
            print_help();
            return Ok(());
        }
        anyhow::bail!("unknown argument {arg}");
    }

    tunebox::app::run()
}

fn print_help() {
    println!("TuneBox");
    println!("  Plays the audio files in TUNEBOX_MUSIC_DIR (default ~/Music).");
    println!("  TUNEBOX_ARTWORK_DIR     artwork folder, <index>.png per track");
    println!("  TUNEBOX_VOLUME          initial volume, 0.0 to 1.0");
    println!("  TUNEBOX_FAVORITES_KEY   name | index");
    println!("  TUNEBOX_CONFIG_DIR      folder for tunebox.log");
}
