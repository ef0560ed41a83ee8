fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=schema/calculator.capnp");
    println!("cargo:rerun-if-changed=schema");

    capnpc::CompilerCommand::new()
        .src_prefix("schema")
        .file("schema/calculator.capnp")
        .run()?;

    Ok(())
}
