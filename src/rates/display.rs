//! Console rendering of the rate tables.

use std::collections::BTreeMap;

use super::engine::ImplicitRates;

const CELL_WIDTH: usize = 26;
const EMPTY_CELL: &str = "************ -> **********";
const SEPARATOR: &str = "++++++++++++++++++++++++++";

fn sorted_cells(rates: Option<&BTreeMap<String, f64>>) -> Vec<String> {
    let mut entries: Vec<(&String, f64)> = rates
        .map(|r| r.iter().map(|(s, &v)| (s, v)).collect())
        .unwrap_or_default();
    entries.sort_by(|a, b| a.1.total_cmp(&b.1));
    entries
        .into_iter()
        .map(|(symbol, rate)| format!("{:<12} -> {:>10.6}", symbol, rate))
        .collect()
}

/// Render one column per maturity: buy-side rates ascending (padded at the
/// top), a separator row, then sell-side rates ascending (padded at the
/// bottom).
pub fn render_rates(rates: &ImplicitRates) -> String {
    let maturities: Vec<_> = rates.maturities().into_iter().collect();
    if maturities.is_empty() {
        return "Updated rates: none".to_string();
    }

    let columns: Vec<(Vec<String>, Vec<String>)> = maturities
        .iter()
        .map(|key| {
            (
                sorted_cells(rates.buy_rates(key)),
                sorted_cells(rates.sell_rates(key)),
            )
        })
        .collect();
    let buy_rows = columns.iter().map(|(b, _)| b.len()).max().unwrap_or(0);
    let sell_rows = columns.iter().map(|(_, s)| s.len()).max().unwrap_or(0);

    let cells: Vec<Vec<String>> = columns
        .into_iter()
        .map(|(buy, sell)| {
            let mut column = vec![EMPTY_CELL.to_string(); buy_rows - buy.len()];
            column.extend(buy);
            column.push(SEPARATOR.to_string());
            let sell_padding = sell_rows - sell.len();
            column.extend(sell);
            column.extend(std::iter::repeat(EMPTY_CELL.to_string()).take(sell_padding));
            column
        })
        .collect();

    let border = format!(
        "+{}+",
        vec!["-".repeat(CELL_WIDTH + 2); maturities.len()].join("+")
    );
    let row = |values: Vec<String>| {
        let inner: Vec<String> = values
            .iter()
            .map(|v| format!(" {:^width$} ", v, width = CELL_WIDTH))
            .collect();
        format!("|{}|", inner.join("|"))
    };

    let mut out = String::from("Updated rates:\n");
    out.push_str(&border);
    out.push('\n');
    out.push_str(&row(maturities.iter().map(|k| k.to_string()).collect()));
    out.push('\n');
    out.push_str(&border);
    out.push('\n');
    for i in 0..buy_rows + 1 + sell_rows {
        out.push_str(&row(cells.iter().map(|c| c[i].clone()).collect()));
        out.push('\n');
    }
    out.push_str(&border);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::MaturityKey;

    #[test]
    fn renders_placeholder_when_empty() {
        assert_eq!(render_rates(&ImplicitRates::default()), "Updated rates: none");
    }

    #[test]
    fn renders_sorted_columns_with_padding() {
        let mut rates = ImplicitRates::default();
        rates.buy.insert(
            MaturityKey::new("DIC23"),
            BTreeMap::from([("PAMP/DIC23".to_string(), 0.45), ("GGAL/DIC23".to_string(), 0.23)]),
        );
        rates.sell.insert(
            MaturityKey::new("DIC23"),
            BTreeMap::from([("GGAL/DIC23".to_string(), 0.34)]),
        );
        rates.buy.insert(
            MaturityKey::new("FEB24"),
            BTreeMap::from([("GGAL/FEB24".to_string(), 0.5)]),
        );

        let table = render_rates(&rates);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[2].contains("DIC23") && lines[2].contains("FEB24"));
        assert!(lines[4].contains("GGAL/DIC23") && lines[4].contains("0.230000"));
        assert!(lines[4].contains(EMPTY_CELL));
        assert!(lines[5].contains("PAMP/DIC23") && lines[5].contains("GGAL/FEB24"));
        assert!(lines[6].contains(SEPARATOR));
        assert!(lines[7].contains("0.340000") && lines[7].contains(EMPTY_CELL));
        assert_eq!(lines.len(), 9);
    }
}
