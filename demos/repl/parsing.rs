use clap::Parser;
use clap_num::maybe_hex;

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
pub enum Command {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, value_parser=maybe_hex::<usize>)]
        size: usize,
    },
    Delete {
        #[arg(long)]
        heap: String,
    },
    Alloc {
        #[arg(long)]
        heap: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_parser=maybe_hex::<usize>)]
        size: usize,
    },
    Free {
        #[arg(long)]
        heap: String,
        #[arg(long)]
        name: String,
    },
    Realloc {
        #[arg(long)]
        heap: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_parser=maybe_hex::<usize>)]
        size: usize,
    },
    Set {
        #[arg(long)]
        heap: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        data: String,
    },
    Get {
        #[arg(long)]
        heap: String,
        #[arg(long)]
        name: String,
    },
    Defrag {
        #[arg(long)]
        heap: String,
    },
    Print {
        #[arg(long)]
        heap: Option<String>,
    },

    Exit,
}
