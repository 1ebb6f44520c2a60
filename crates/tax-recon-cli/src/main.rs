fn main() -> anyhow::Result<()> {
    tax_recon_cli::run(std::env::args())
}
