use anyhow::Result;

fn main() -> Result<()> {
    vproxy_probe::cli::run()
}
