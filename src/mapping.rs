// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 类别ID → 卡牌ID 映射, 以及类别名称文件加载

use std::fs;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

/// 卡牌ID (对外的业务标识)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub i32);

impl ExternalId {
    /// 无效类别ID的哨兵值
    pub const INVALID: ExternalId = ExternalId(-1);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 模型类别下标 → 卡牌ID, 无算术规律的固定排列
pub const CARD_ID_TABLE: [i32; 24] = [
    10, 15, 1, 21, 23, 13, 2, 7, 9, 5, 22, 12, 19, 6, 17, 3, 20, 11, 16, 14, 24, 8, 4, 18,
];

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierMapper {
    table: Vec<ExternalId>,
}

impl Default for IdentifierMapper {
    fn default() -> Self {
        Self {
            table: CARD_ID_TABLE.iter().map(|&id| ExternalId(id)).collect(),
        }
    }
}

impl IdentifierMapper {
    /// 自定义映射表: 卡牌ID必须为正整数且互不重复
    pub fn from_table(table: &[i32]) -> Result<Self, ConfigError> {
        if table.is_empty() {
            return Err(ConfigError::IdTable("table is empty".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for (class_id, &id) in table.iter().enumerate() {
            if id <= 0 {
                return Err(ConfigError::IdTable(format!(
                    "class {} maps to {}, card ids must be positive",
                    class_id, id
                )));
            }
            if !seen.insert(id) {
                return Err(ConfigError::IdTable(format!(
                    "external id {} is assigned twice",
                    id
                )));
            }
        }
        Ok(Self {
            table: table.iter().map(|&id| ExternalId(id)).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// 越界的类别ID返回 `ExternalId::INVALID` 并记录警告, 不中断当前帧
    pub fn map(&self, class_id: usize) -> ExternalId {
        match self.table.get(class_id) {
            Some(&id) => id,
            None => {
                warn!("⚠️ 无效类别ID: {} (有效范围 0..{})", class_id, self.table.len());
                ExternalId::INVALID
            }
        }
    }
}

/// 读取类别名称文件 (每行一个名称)
pub fn load_class_list(path: &str) -> Result<Vec<String>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::ClassList {
        path: path.to_string(),
        source,
    })?;
    let names: Vec<String> = text.lines().map(str::to_string).collect();

    for (i, name) in names.iter().enumerate() {
        info!("Class {}: {}", i, name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reference_table() {
        let mapper = IdentifierMapper::default();
        assert_eq!(mapper.len(), 24);
        assert_eq!(mapper.map(0), ExternalId(10));
        assert_eq!(mapper.map(2), ExternalId(1));
        assert_eq!(mapper.map(20), ExternalId(24));
        assert_eq!(mapper.map(23), ExternalId(18));
    }

    #[test]
    fn test_table_is_permutation() {
        let mapper = IdentifierMapper::default();
        let mut ids: Vec<i32> = (0..24).map(|c| mapper.map(c).0).collect();
        ids.sort();
        assert_eq!(ids, (1..=24).collect::<Vec<_>>());
    }

    #[test]
    fn test_deterministic() {
        let mapper = IdentifierMapper::default();
        for c in 0..24 {
            assert_eq!(mapper.map(c), mapper.map(c));
        }
    }

    #[test]
    fn test_out_of_range() {
        let mapper = IdentifierMapper::default();
        assert_eq!(mapper.map(24), ExternalId::INVALID);
        assert_eq!(mapper.map(usize::MAX), ExternalId::INVALID);
        assert!(!mapper.map(100).is_valid());
    }

    #[test]
    fn test_custom_table() {
        let mapper = IdentifierMapper::from_table(&[3, 1, 2]).unwrap();
        assert_eq!(mapper.map(0), ExternalId(3));
        assert_eq!(mapper.map(3), ExternalId::INVALID);

        assert!(IdentifierMapper::from_table(&[1, 1]).is_err());
        assert!(IdentifierMapper::from_table(&[1, -1]).is_err());
        assert!(IdentifierMapper::from_table(&[]).is_err());
    }

    #[test]
    fn test_custom_table_rejects_non_positive_ids() {
        for bad in [[1, 0], [1, -7], [i32::MIN, 2]] {
            assert!(
                matches!(IdentifierMapper::from_table(&bad), Err(ConfigError::IdTable(_))),
                "{:?}",
                bad
            );
        }
        assert!(IdentifierMapper::from_table(&[1000, 7]).is_ok());
    }

    #[test]
    fn test_load_class_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "ace_of_spades\r\nking_of_hearts\nqueen").unwrap();
        let names = load_class_list(file.path().to_str().unwrap()).unwrap();
        assert_eq!(names, vec!["ace_of_spades", "king_of_hearts", "queen"]);

        assert!(load_class_list("/nonexistent/classes.names").is_err());
    }
}
