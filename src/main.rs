fn main() -> Result<(), Box<dyn std::error::Error>> {
    ggufchat::cli::main()
}
