//! Debug tool: print the positioned spans of a page and the located heading
//!
//! Usage: debug-spans <pdf_file> [page_number]

use std::env;
use std::process;
use tsp_extractor::boundary::find_header_boundary;
use tsp_extractor::config::{SUMMARY_HEADING, SUMMARY_HEADING_PARTIAL};
use tsp_extractor::{PageSource, PdfDocument};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug-spans <pdf_path> [page_number]");
        process::exit(1);
    }

    let page: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1);

    let doc = match PdfDocument::open(&args[1]) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if page == 0 || page > doc.page_count() {
        eprintln!("Page {} out of range (document has {})", page, doc.page_count());
        process::exit(1);
    }

    let layout = match doc.page_layout(page - 1) {
        Ok(layout) => layout,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    match layout.page_size {
        Some(size) => println!("=== PAGE {} ({:.0} x {:.0}) ===", page, size.width, size.height),
        None => println!("=== PAGE {} (no MediaBox) ===", page),
    }

    for (i, block) in layout.blocks.iter().enumerate() {
        println!(
            "block {:3} y0={:7.1} y1={:7.1} lines={}",
            i,
            block.bbox.y0,
            block.bbox.y1,
            block.lines.len()
        );
        for span in block.spans() {
            println!(
                "    x0={:7.1} y0={:7.1} x1={:7.1} y1={:7.1} font={:<6} fs={:5.1} text={:?}",
                span.bbox.x0,
                span.bbox.y0,
                span.bbox.x1,
                span.bbox.y1,
                span.font,
                span.font_size,
                span.text
            );
        }
    }

    println!();
    match find_header_boundary(&layout.blocks, SUMMARY_HEADING, SUMMARY_HEADING_PARTIAL) {
        Some(b) => println!("Header boundary: y0={:.1} y1={:.1}", b.y0, b.y1),
        None => println!("Header boundary: not found (fallback would be used)"),
    }
}
