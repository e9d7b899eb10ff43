// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 时序一致性过滤
//
// 最近 W 帧的观测集合组成滑动窗口 (FIFO), 某张卡牌在窗口内出现次数 >= T 才上报。
// 每帧都从整个窗口重新统计, 不维护增量计数。

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::detection::{FilteredDetection, Position};
use crate::error::ConfigError;
use crate::mapping::{ExternalId, IdentifierMapper};

pub const WINDOW_SIZE: usize = 10;
pub const CONSISTENCY_THRESHOLD: usize = 7;

/// 单帧观测: 卡牌ID → 检测框左上角
///
/// 同一帧内同一ID出现多次时保留最后写入的位置。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameObservationSet {
    observations: BTreeMap<ExternalId, Position>,
}

impl FrameObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由保留框构建, 无效ID丢弃; 返回 (观测集合, 无效ID数量)
    pub fn from_detections(
        detections: &[FilteredDetection],
        mapper: &IdentifierMapper,
    ) -> (Self, usize) {
        let mut set = Self::new();
        let mut invalid = 0;
        for det in detections {
            let id = mapper.map(det.class_id);
            if id.is_valid() {
                set.insert(id, det.rect.tl());
            } else {
                invalid += 1;
            }
        }
        (set, invalid)
    }

    pub fn insert(&mut self, id: ExternalId, position: Position) {
        self.observations.insert(id, position);
    }

    pub fn get(&self, id: ExternalId) -> Option<Position> {
        self.observations.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExternalId, Position)> + '_ {
        self.observations.iter().map(|(&id, &pos)| (id, pos))
    }
}

impl FromIterator<(ExternalId, Position)> for FrameObservationSet {
    fn from_iter<I: IntoIterator<Item = (ExternalId, Position)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (id, pos) in iter {
            set.insert(id, pos);
        }
        set
    }
}

/// 稳定上报: 卡牌ID + 窗口内最近一次出现的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableReport {
    pub id: ExternalId,
    pub position: Position,
}

pub struct ConsistencyFilter {
    window: VecDeque<FrameObservationSet>,
    window_size: usize,
    threshold: usize,
}

impl Default for ConsistencyFilter {
    fn default() -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW_SIZE + 1),
            window_size: WINDOW_SIZE,
            threshold: CONSISTENCY_THRESHOLD,
        }
    }
}

impl ConsistencyFilter {
    pub fn new(window_size: usize, threshold: usize) -> Result<Self, ConfigError> {
        if window_size == 0 {
            return Err(ConfigError::Invalid {
                name: "window_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if threshold == 0 || threshold > window_size {
            return Err(ConfigError::Invalid {
                name: "consistency_threshold",
                reason: format!("must be in 1..={}, got {}", window_size, threshold),
            });
        }
        Ok(Self {
            window: VecDeque::with_capacity(window_size + 1),
            window_size,
            threshold,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// 当前窗口内的帧数
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// 压入新一帧, 超出容量时淘汰最旧的一帧
    pub fn push(&mut self, frame: FrameObservationSet) {
        self.window.push_back(frame);
        if self.window.len() > self.window_size {
            self.window.pop_front();
        }
    }

    /// 扫描整个窗口, 统计每个ID的出现次数和最近位置
    pub fn stable_reports(&self) -> Vec<StableReport> {
        let mut counts: BTreeMap<ExternalId, (usize, Position)> = BTreeMap::new();
        for frame in &self.window {
            for (id, pos) in frame.iter() {
                let entry = counts.entry(id).or_insert((0, pos));
                entry.0 += 1;
                // 取最新位置, 不做平均
                entry.1 = pos;
            }
        }

        counts
            .into_iter()
            .filter(|(_, (count, _))| *count >= self.threshold)
            .map(|(id, (count, position))| {
                debug!("卡牌 {} 窗口内出现 {}/{} 帧", id, count, self.window.len());
                StableReport { id, position }
            })
            .collect()
    }

    /// 每帧调用一次: push + 重新统计
    pub fn update(&mut self, frame: FrameObservationSet) -> Vec<StableReport> {
        self.push(frame);
        self.stable_reports()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Rect;

    fn frame_with(ids: &[(i32, i32, i32)]) -> FrameObservationSet {
        ids.iter()
            .map(|&(id, x, y)| (ExternalId(id), Position::new(x, y)))
            .collect()
    }

    fn report(id: i32, x: i32, y: i32) -> StableReport {
        StableReport {
            id: ExternalId(id),
            position: Position::new(x, y),
        }
    }

    #[test]
    fn test_window_bound() {
        let mut filter = ConsistencyFilter::default();
        for i in 1..=25 {
            filter.push(FrameObservationSet::new());
            assert_eq!(filter.len(), i.min(WINDOW_SIZE));
        }
    }

    #[test]
    fn test_scenario_a_ages_out() {
        let mut filter = ConsistencyFilter::default();
        for k in 1..=20 {
            let frame = if k <= 7 {
                frame_with(&[(5, 100, 200)])
            } else {
                FrameObservationSet::new()
            };
            let reports = filter.update(frame);
            if (7..=10).contains(&k) {
                assert_eq!(reports, vec![report(5, 100, 200)], "frame {}", k);
            } else {
                assert!(reports.is_empty(), "frame {}", k);
            }
        }
    }

    #[test]
    fn test_scenario_b_six_of_ten() {
        let mut filter = ConsistencyFilter::default();
        let present = [true, false, true, true, false, true, false, true, false, true];
        assert_eq!(present.iter().filter(|&&p| p).count(), 6);
        for _ in 0..3 {
            for &p in &present {
                let frame = if p {
                    frame_with(&[(9, 1, 1)])
                } else {
                    FrameObservationSet::new()
                };
                assert!(filter.update(frame).is_empty());
            }
        }
    }

    #[test]
    fn test_threshold_before_window_full() {
        let mut filter = ConsistencyFilter::default();
        for k in 1..=7 {
            let reports = filter.update(frame_with(&[(3, 0, 0)]));
            assert_eq!(reports.is_empty(), k < 7);
        }
        assert_eq!(filter.len(), 7);
    }

    #[test]
    fn test_latest_position_reported() {
        let mut filter = ConsistencyFilter::default();
        for k in 0..7 {
            filter.push(frame_with(&[(12, k * 10, k)]));
        }
        // 最新一帧没有该ID, 位置取窗口内最近一次出现
        filter.push(frame_with(&[(4, 0, 0)]));
        assert_eq!(filter.stable_reports(), vec![report(12, 60, 6)]);
    }

    #[test]
    fn test_duplicate_id_in_frame_counts_once() {
        let mapper = IdentifierMapper::default();
        let dets = vec![
            FilteredDetection {
                class_id: 0,
                confidence: 0.9,
                rect: Rect::new(10, 20, 5, 5),
            },
            FilteredDetection {
                class_id: 0,
                confidence: 0.8,
                rect: Rect::new(30, 40, 5, 5),
            },
            FilteredDetection {
                class_id: 99,
                confidence: 0.8,
                rect: Rect::new(0, 0, 5, 5),
            },
        ];
        let (set, invalid) = FrameObservationSet::from_detections(&dets, &mapper);
        assert_eq!(invalid, 1);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(ExternalId(10)), Some(Position::new(30, 40)));
    }

    #[test]
    fn test_reports_sorted_by_id() {
        let mut filter = ConsistencyFilter::new(3, 2).unwrap();
        filter.push(frame_with(&[(20, 0, 0), (2, 0, 0), (7, 0, 0)]));
        filter.push(frame_with(&[(7, 1, 1), (20, 1, 1), (2, 1, 1)]));
        let ids: Vec<i32> = filter.stable_reports().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 7, 20]);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(ConsistencyFilter::new(0, 0).is_err());
        assert!(ConsistencyFilter::new(10, 11).is_err());
        assert!(ConsistencyFilter::new(10, 0).is_err());
        assert!(ConsistencyFilter::new(10, 10).is_ok());
    }
}
