use clap::{arg,crate_version,Command};
use sqz::{squeeze,STD_PARAMS};

const RCH: &str = "unreachable was reached";

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::init();

    let long_help =
"Examples:
---------
Compress:      `sqz compress -i my_file -o my_file.sqz`
Expand:        `sqz expand -i my_file.sqz -o my_file`";

    let mut main_cmd = Command::new("sqz")
        .about("Compress and expand with LZ77, adaptive Huffman coding, and a phrase dictionary")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(-w --window <BITS> "log2 of window size, 10 to 20").required(false))
        .arg(arg!(-m --map <BITS> "log2 of dictionary slots, 8 to 20").required(false))
        .arg(arg!(-l --length <BITS> "log2 of length alphabet, 4 to 8").required(false))
        .about("compress a file"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .about("expand a file"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let mut params = STD_PARAMS;
        if let Some(bits) = cmd.get_one::<String>("window") {
            params.win_bits = bits.parse()?;
        }
        if let Some(bits) = cmd.get_one::<String>("map") {
            params.map_bits = bits.parse()?;
        }
        if let Some(bits) = cmd.get_one::<String>("length") {
            params.len_bits = bits.parse()?;
        }
        log::debug!("session footprint is {} bytes",squeeze::Squeeze::footprint(&params));
        let dat = std::fs::read(path_in)?;
        let compressed = squeeze::compress_slice(&dat,&params)?;
        eprintln!("{} -> {} {:.1}% of \"{}\"",dat.len(),compressed.len(),
            compressed.len() as f64 * 100.0 / dat.len().max(1) as f64,path_in);
        std::fs::write(path_out,compressed)?;
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let dat = std::fs::read(path_in)?;
        let expanded = squeeze::expand_slice(&dat)?;
        eprintln!("{} -> {} \"{}\"",dat.len(),expanded.len(),path_in);
        std::fs::write(path_out,expanded)?;
    }

    Ok(())
}
