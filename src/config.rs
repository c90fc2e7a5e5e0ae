use std::path::PathBuf;
use std::time::Duration;

pub const BASE_URL: &str = "https://www.anbima.com.br/informacoes/merc-sec-debentures/arqs/";

pub const BUSINESS_DAYS_COUNT: u32 = 5;
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

pub const DEFAULT_DATA_DIR: &str = "Daily Prices";
const SOURCE_SUBDIR: &str = "Source";
const PLOT_SUBDIR: &str = "Plots";

pub const RAW_DATA_FILE: &str = "dataset_source_combined.csv";
pub const CLEANED_DATA_FILE: &str = "cleaned_dataset.csv";

/// Canonical names of the 15 spreadsheet columns, in sheet order.
pub const COLUMNS: [&str; 15] = [
    "Código",
    "Nome",
    "Repac./ Venc.",
    "Índice/ Correção",
    "Taxa de Compra",
    "Taxa de Venda",
    "Taxa Indicativa",
    "Desvio Padrão",
    "Intervalo Indicativo Min.",
    "Intervalo Indicativo Máx.",
    "PU",
    "% Pu Par",
    "Duration",
    "% Reune",
    "Referência NTN-B",
];

pub const CODE: &str = "Código";
pub const NAME: &str = "Nome";
pub const PU: &str = "PU";
pub const INDICATIVE_RATE: &str = "Taxa Indicativa";
pub const SHEET_NAME: &str = "sheet_name";
pub const DATE: &str = "data";
pub const INDEXER: &str = "Indexer";

pub const DATASET_COLUMNS_TO_SELECT: [&str; 6] =
    [CODE, NAME, PU, INDICATIVE_RATE, SHEET_NAME, DATE];
pub const DATASET_FINAL_COLUMNS: [&str; 6] = [CODE, NAME, PU, INDICATIVE_RATE, DATE, INDEXER];

/// English month abbreviation (uppercase) to the lowercase Portuguese one used in file names.
pub const MONTHS_PT_BR: [(&str, &str); 12] = [
    ("JAN", "jan"),
    ("FEB", "fev"),
    ("MAR", "mar"),
    ("APR", "abr"),
    ("MAY", "mai"),
    ("JUN", "jun"),
    ("JUL", "jul"),
    ("AUG", "ago"),
    ("SEP", "set"),
    ("OCT", "out"),
    ("NOV", "nov"),
    ("DEC", "dez"),
];

pub fn month_pt_br(english_abbr: &str) -> Option<&'static str> {
    MONTHS_PT_BR
        .iter()
        .find(|(en, _)| en.eq_ignore_ascii_case(english_abbr))
        .map(|(_, pt)| *pt)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub business_days: u32,
    pub data_dir: PathBuf,
    pub base_url: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            business_days: BUSINESS_DAYS_COUNT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            base_url: BASE_URL.to_string(),
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
            timeout: HTTP_TIMEOUT,
        }
    }
}

impl Config {
    pub fn source_dir(&self) -> PathBuf {
        self.data_dir.join(SOURCE_SUBDIR)
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    pub fn plot_dir(&self) -> PathBuf {
        self.data_dir.join(PLOT_SUBDIR)
    }

    pub fn raw_data_path(&self) -> PathBuf {
        self.dataset_dir().join(RAW_DATA_FILE)
    }

    pub fn cleaned_data_path(&self) -> PathBuf {
        self.dataset_dir().join(CLEANED_DATA_FILE)
    }
}
