//! 심볼 목록 출력.

use anyhow::Result;
use otc_core::AppConfig;

/// 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(anyhow::anyhow!("Invalid format: {}. Use: table, json", s)),
        }
    }
}

/// 심볼 목록을 문자열로 렌더링합니다.
pub fn render_symbols(config: &AppConfig, format: OutputFormat) -> Result<String> {
    let symbols = config.symbols.policy().listing();
    match format {
        OutputFormat::Table => Ok(symbols.join("\n")),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(
            &serde_json::json!({ "symbols": symbols }),
        )?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_allow_list() {
        let mut config = AppConfig::default();
        config.symbols.allow_list = vec!["EURUSD_OTC".into(), "AUDCAD_OTC".into()];

        let table = render_symbols(&config, OutputFormat::Table).unwrap();
        assert_eq!(table, "AUDCAD_OTC\nEURUSD_OTC");

        let json: serde_json::Value =
            serde_json::from_str(&render_symbols(&config, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["symbols"][1], "EURUSD_OTC");
    }

    #[test]
    fn test_default_listing_is_not_empty() {
        let table = render_symbols(&AppConfig::default(), OutputFormat::Table).unwrap();
        assert!(table.contains("EURUSD_OTC"));
        assert!(OutputFormat::parse("xml").is_err());
    }
}
