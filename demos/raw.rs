use clap::Parser;
use common::{parse_hex, CommonOpts};
use ipmb_rs::connection::NetFn;

mod common;

#[derive(Parser)]
pub struct Command {
    #[clap(flatten)]
    common: CommonOpts,

    /// NetFn, command and data bytes, as hex
    #[clap(required = true)]
    message: Vec<String>,
}

fn main() -> std::io::Result<()> {
    common::init_logger();

    let command = Command::parse();

    let mut bytes = Vec::new();
    for arg in &command.message {
        let value = parse_hex(arg)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        bytes.push(value);
    }

    if bytes.len() < 2 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Need at least 2 bytes of input".to_string(),
        ));
    }

    let netfn = NetFn::from(bytes[0]);
    let cmd = bytes[1];
    let data = bytes[2..].to_vec();

    let mut controller = command.common.get_controller()?;

    let reply = controller.send_raw(netfn, cmd, data).map_err(|e| {
        log::error!("Raw command failed: {e}");
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;

    println!("Response:");
    match reply.completion_code() {
        Some(cc) => println!("Completion code: 0x{:02X} ({cc})", u8::from(cc)),
        None => println!("Completion code: missing"),
    }
    println!("NetFN: 0x{:02X} ({:?})", reply.netfn_raw(), reply.netfn());
    println!("Cmd: 0x{:02X}", reply.cmd());
    println!("Data: {}", hex::encode(reply.data()));
    Ok(())
}
