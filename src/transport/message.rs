// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 推送消息格式: {"Array": [{"id": 5, "pos_x": 100, "pos_y": 200}, ...]}

use serde::{Deserialize, Serialize};

use crate::consistency::StableReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDetection {
    pub id: i32,
    pub pos_x: i32,
    pub pos_y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "Array")]
    pub array: Vec<WireDetection>,
}

impl OutboundMessage {
    pub fn from_reports(reports: &[StableReport]) -> Self {
        Self {
            array: reports
                .iter()
                .map(|r| WireDetection {
                    id: r.id.0,
                    pos_x: r.position.x,
                    pos_y: r.position.y,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
