use std::io::Cursor;

use csvtab_error::Result;
use csvtab_parser::{CsvParser, ParseStatus, ParserOptions, Row};
use proptest::prelude::*;

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

fn encode(rows: &[Vec<String>], terminator: &str) -> String {
    let mut out = String::new();
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| quote(c)).collect();
        out.push_str(&cells.join(","));
        out.push_str(terminator);
    }
    out
}

fn parse(input: &[u8], options: ParserOptions) -> Result<Vec<Vec<String>>> {
    let mut parser = CsvParser::new(Cursor::new(input.to_vec()), options)?;
    let mut rows = Vec::new();
    let mut collect = |row: &Row<'_>| -> Result<()> {
        rows.push(
            row.cells()
                .map(|c| String::from_utf8_lossy(c.bytes).into_owned())
                .collect(),
        );
        Ok(())
    };
    while parser.parse_more(&mut collect)? == ParseStatus::Ok {}
    parser.finish(&mut collect)?;
    Ok(rows)
}

fn table() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(
        prop::collection::vec("[a-z\",\r\n ]{0,12}", 1..6),
        0..12,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_quoted_rows_survive_small_buffers(
        rows in table(),
        crlf in any::<bool>(),
        chunk in 1usize..17,
    ) {
        let input = encode(&rows, if crlf { "\r\n" } else { "\n" });
        let options = ParserOptions::default()
            .with_buffer_size(256)
            .with_read_chunk(chunk);
        let parsed = parse(input.as_bytes(), options).unwrap();
        prop_assert_eq!(parsed, rows);
    }

    #[test]
    fn prop_missing_final_terminator_still_yields_last_row(
        rows in table().prop_filter("need a row", |r| !r.is_empty()),
    ) {
        let mut input = encode(&rows, "\n");
        input.pop();
        let parsed = parse(input.as_bytes(), ParserOptions::default()).unwrap();
        prop_assert_eq!(parsed, rows);
    }

    #[test]
    fn prop_column_limit_enforced(width in 1usize..10, max in 1usize..10) {
        let header: Vec<String> = (0..width).map(|i| format!("c{i}")).collect();
        let input = format!("{}\n", header.join(","));
        let outcome = parse(input.as_bytes(), ParserOptions::default().with_max_columns(max));
        prop_assert_eq!(outcome.is_ok(), width <= max);
    }
}
