fn main() -> anyhow::Result<()> {
    vcfconvert::cli::run()
}
