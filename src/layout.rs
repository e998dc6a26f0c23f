//! Fixed constants of the three-sheet budget template family: titles,
//! column positions, labels, fills and number formats.

/// Recognised spreadsheet extensions (lower-case, without the dot).
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xltx", "xltm"];

/// Titles given to the consolidated sheets, in input order.
pub const TARGET_SHEET_TITLES: [&str; 3] = [
    "Composições com Preço Unitário",
    "Curva ABC de Insumos",
    "Orçamento Sintético",
];

/// Number of input workbooks a consolidation requires.
pub const INPUT_COUNT: usize = TARGET_SHEET_TITLES.len();

/// Saturated blue used by the source templates for title bands.
pub const BAND_BLUE: &str = "0000FF";
/// Replacement color applied to title bands in the final pass.
pub const BAND_STEEL: &str = "366092";
pub const WHITE: &str = "FFFFFF";

pub const CURRENCY_FORMAT: &str = "R$ #,##0.00";
pub const DOLLAR_FORMAT: &str = "\"$\" #,##0.00";
pub const PERCENT_FORMAT: &str = "0.00%";
pub const THOUSANDS_FORMAT: &str = "#,##0.00";
pub const TEXT_FORMAT: &str = "@";
pub const ACCOUNTING_FORMAT: &str =
    "_-\"R$\" * #,##0.00_-;-\"R$\" * #,##0.00_-;_-\"R$\" * \"-\"??_-;_-@_-";

pub const COL_A: u32 = 1;
pub const COL_B: u32 = 2;
pub const COL_C: u32 = 3;
pub const COL_D: u32 = 4;
pub const COL_E: u32 = 5;
pub const COL_F: u32 = 6;
pub const COL_G: u32 = 7;
pub const COL_H: u32 = 8;
pub const COL_I: u32 = 9;
pub const COL_J: u32 = 10;
pub const COL_K: u32 = 11;
pub const COL_L: u32 = 12;
pub const COL_M: u32 = 13;
pub const COL_N: u32 = 14;

/// Input-cost ABC curve.
pub mod abc {
    use super::*;

    pub const TITLE_FRAGMENT: &str = "Curva ABC de Insumos";

    /// Columns removed from the raw export, right to left.
    pub const REMOVED_COLUMNS: [u32; 5] = [COL_M, COL_L, COL_J, COL_H, COL_C];
    pub const REMOVED_ROW: u32 = 5;

    pub const HEADER_ROW: u32 = 4;
    pub const BAND_ROW: u32 = 3;
    pub const FIRST_ITEM_ROW: u32 = 5;
    pub const FIRST_DATA_SCAN_ROW: u32 = 2;
    pub const LAST_COLUMN: u32 = COL_L;

    pub const CODE_COLUMN: u32 = COL_A;
    pub const BANK_COLUMN: u32 = COL_B;
    pub const DESCRIPTION_COLUMN: u32 = COL_C;
    pub const QUANTITY_COLUMN: u32 = COL_F;
    pub const UNIT_PRICE_COLUMN: u32 = COL_G;
    pub const TOTAL_COLUMN: u32 = COL_H;
    pub const SHARE_COLUMN: u32 = COL_I;
    pub const BASE_PRICE_COLUMN: u32 = COL_J;
    pub const DISCOUNT_COLUMN: u32 = COL_K;
    pub const NOTES_COLUMN: u32 = COL_L;

    /// Columns whose text values are converted to numbers.
    pub const NUMERIC_COLUMNS: std::ops::RangeInclusive<u32> = COL_F..=COL_L;

    pub const SHARE_HEADER: &str = "Porcentagem (%)";
    pub const BASE_PRICE_HEADER: &str = "Valor unitário (BASE)";
    pub const NOTES_HEADER: &str = "Observações";
    pub const DISCOUNT_HEADER: &str = "Desconto";
    pub const SOCIAL_CHARGES_HEADER: &str = "Encargos Sociais";
    pub const NOTES_PLACEHOLDER: &str = "RECIFE-20XX";

    /// Parameter labels written in row 1.
    pub const PARAMETER_LABELS: [(&str, &str); 6] = [
        ("D1", "Bancos"),
        ("I1", "UNIBASE"),
        ("J1", "CERTAME"),
        ("K1", "DESCONTO"),
        ("L1", super::synthetic::COLLECTION_HEADER),
        ("F1", "B.D.I."),
    ];

    pub const FINAL_MERGES: [&str; 5] = ["A1:B2", "D1:E1", "D2:E2", "G1:H1", "G2:H2"];
}

/// Unit-price composition sheet ("CPU").
pub mod compositions {
    use super::*;

    pub const TITLE_FRAGMENTS: [&str; 2] = ["CPU", "Compos"];

    pub const REMOVED_LEADING_ROWS: u32 = 2;
    pub const REMOVED_COLUMN: u32 = COL_F;

    pub const KIND_COLUMN: u32 = COL_A;
    pub const CODE_COLUMN: u32 = COL_B;
    pub const SOURCE_COLUMN: u32 = COL_C;
    pub const DESCRIPTION_COLUMN: u32 = COL_D;
    pub const NOTE_COLUMN: u32 = COL_E;
    pub const QUANTITY_COLUMN: u32 = COL_G;
    pub const UNIT_PRICE_COLUMN: u32 = COL_H;
    pub const TOTAL_COLUMN: u32 = COL_I;
    /// Auxiliary lines are linked to their priced composition through the
    /// normalised text of this column.
    pub const LINK_KEY_COLUMN: u32 = COL_B;
    pub const LAST_COLUMN: u32 = COL_I;

    /// Footer texts whose cell is cleared.
    pub const CLEARED_NOTES: [&str; 2] = ["MO sem LS =>", "Valor do BDI =>"];
    /// Footer texts whose whole row is cleared.
    pub const CLEARED_ROW_MARKERS: [&str; 2] = ["Valor com BDI =>", "MO com LS =>"];

    pub const ITEM_KIND: &str = "Item";
    pub const INPUT_KIND: &str = "Insumo";
    pub const AUXILIARY_KIND: &str = "Composição Auxiliar";
    pub const ORSE_SOURCE: &str = "ORSE";
    pub const ORSE_DETAIL_MARKER: &str = "Detalhamento de Cálculo ORSE";
    pub const AUXILIARY_SECTION: &str = "Composições Auxiliares";

    pub const VISIBLE_ROW_HEIGHT: f64 = 15.0;
    pub const BAND_FONT_SIZE: f64 = 14.0;

    pub const DESCRIPTION_NOT_FOUND: &str = "Descrição não encontrada";
    pub const CODE_NOT_FOUND: &str = "Código não encontrado";
}

/// Synthetic (summary) budget sheet.
pub mod synthetic {
    use super::*;

    pub const TITLE_FRAGMENT: &str = "Sintético";
    pub const TITLE: &str = "Orçamento Sintético";

    pub const REMOVED_ROW: u32 = 5;
    /// Columns removed from the raw export, right to left.
    pub const REMOVED_COLUMNS: [u32; 5] = [COL_N, COL_M, COL_J, COL_I, COL_H];

    pub const HEADER_ROW: u32 = 4;
    pub const BAND_ROW: u32 = 3;
    pub const FIRST_ITEM_ROW: u32 = 5;
    pub const LAST_COLUMN: u32 = COL_K;

    pub const HIERARCHY_COLUMN: u32 = COL_A;
    pub const CODE_COLUMN: u32 = COL_B;
    pub const DESCRIPTION_COLUMN: u32 = COL_D;
    pub const BANK_COLUMN: u32 = COL_E;
    pub const QUANTITY_COLUMN: u32 = COL_F;
    pub const UNIT_PRICE_COLUMN: u32 = COL_G;
    pub const UNIT_WITH_BDI_COLUMN: u32 = COL_H;
    pub const TOTAL_COLUMN: u32 = COL_I;
    pub const TOTAL_WITH_BDI_COLUMN: u32 = COL_J;
    pub const WEIGHT_COLUMN: u32 = COL_K;

    /// Cell holding the BDI rate once H1/H2 moved to G1/G2.
    pub const BDI_RATE: &str = "$G$2";

    pub const COLLECTION_HEADER: &str = "ACERVO";
    pub const COLLECTION_PLACEHOLDER: &str = abc::NOTES_PLACEHOLDER;

    pub const HEADERS: [(&str, &str); 7] = [
        ("E4", "Bancos"),
        ("F4", "B.D.I."),
        ("G4", "Valor Unit"),
        ("H4", "Valor Unit com BDI"),
        ("I4", "Total sem BDI"),
        ("J4", "Total com BDI"),
        ("K4", "Peso (%)"),
    ];

    pub const TOTAL_WITHOUT_BDI: &str = "Total sem BDI";
    pub const GRAND_TOTAL: &str = "Total Geral";
    pub const BDI_TOTAL: &str = "Total do BDI";
    pub const TOTALS_ARROW: &str = "Totais ->";
    pub const TOTAL_KEYWORDS: [&str; 4] = [TOTAL_WITHOUT_BDI, BDI_TOTAL, GRAND_TOTAL, "Totais"];

    pub const HEADER_MERGES: [&str; 5] = ["A1:C2", "E1:F1", "E2:F2", "H2:J2", "H1:J1"];
    pub const TOTAL_COLUMN_WIDTH: f64 = 15.0;
}
