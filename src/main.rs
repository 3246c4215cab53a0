fn main() -> anyhow::Result<()> {
    deimos_redux::cli_main::main()
}
