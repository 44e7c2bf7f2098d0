//! Staff dashboard figures
//!
//! Every figure is computed from plain rows returned by the persistence
//! gateway, optionally restricted to a date window. [`Dashboard::load`]
//! fetches the rows and computes everything at once; a table that cannot be
//! read only zeroes the figures built from it.

use chrono::{DateTime, Days, NaiveDate, Utc};
use enum_map::EnumMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    TruncatedVec,
    config::Options,
    constants::{analytics::FALLBACK_ICON, survey as survey_limits},
    gateway::{GatewayResult, PersistenceGateway, RiddleStore},
    records::{AnalyticsSession, CompletionStatus, Family, ProgressRecord},
    riddle::Riddle,
    survey::{FavoriteAspect, SurveyResponse},
};

/// Date windows offered on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFilter {
    /// The last seven days
    Last7Days,
    /// The last thirty days
    Last30Days,
    /// No restriction
    #[default]
    AllTime,
}

/// Inclusive window of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    /// Window start
    pub start: DateTime<Utc>,
    /// Window end
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Whether an instant falls inside the window
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

impl DateFilter {
    /// Window ending at `now`, or `None` for all time
    pub fn range(self, now: DateTime<Utc>) -> Option<DateRange> {
        let days = match self {
            Self::Last7Days => 7,
            Self::Last30Days => 30,
            Self::AllTime => return None,
        };
        Some(DateRange {
            start: now.checked_sub_days(Days::new(days)).unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: now,
        })
    }
}

fn within(range: Option<&DateRange>, instant: DateTime<Utc>) -> bool {
    range.is_none_or(|range| range.contains(instant))
}

/// Rounds half up, matching how figures are shown on the dashboard
fn round(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        round(part as f64 * 100. / total as f64) as u32
    }
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.).round() / 10.
}

/// Families created inside the window
pub fn total_families(families: &[Family], range: Option<&DateRange>) -> usize {
    families
        .iter()
        .filter(|family| within(range, family.created_at))
        .count()
}

/// Mean length of completed sessions started inside the window, in whole minutes
pub fn average_session_minutes(sessions: &[AnalyticsSession], range: Option<&DateRange>) -> u64 {
    let durations = sessions
        .iter()
        .filter(|session| {
            session.completion_status == CompletionStatus::Completed
                && within(range, session.started_at)
        })
        .filter_map(AnalyticsSession::duration_minutes)
        .collect_vec();
    if durations.is_empty() {
        return 0;
    }
    round(durations.iter().sum::<f64>() / durations.len() as f64).max(0) as u64
}

/// Share of sessions started inside the window that were completed, in percent
pub fn completion_rate(sessions: &[AnalyticsSession], range: Option<&DateRange>) -> u32 {
    let funnel = Funnel::compute(sessions, range);
    funnel.percent(CompletionStatus::Completed)
}

/// Progress rows recorded inside the window
pub fn total_discoveries(progress: &[ProgressRecord], range: Option<&DateRange>) -> usize {
    progress
        .iter()
        .filter(|record| within(range, record.completed_at))
        .count()
}

/// Sessions by completion status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Funnel {
    counts: EnumMap<CompletionStatus, usize>,
    total: usize,
}

impl Funnel {
    /// Classifies sessions started inside the window
    pub fn compute(sessions: &[AnalyticsSession], range: Option<&DateRange>) -> Self {
        let mut funnel = Self::default();
        for session in sessions
            .iter()
            .filter(|session| within(range, session.started_at))
        {
            funnel.counts[session.completion_status] += 1;
            funnel.total += 1;
        }
        funnel
    }

    /// Sessions with the given status
    pub fn count(&self, status: CompletionStatus) -> usize {
        self.counts[status]
    }

    /// Every session counted
    pub fn total(&self) -> usize {
        self.total
    }

    /// Share of sessions with the given status, in percent
    pub fn percent(&self, status: CompletionStatus) -> u32 {
        percent(self.counts[status], self.total)
    }
}

/// Sessions started on one calendar day (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailySessions {
    /// Calendar day
    pub date: NaiveDate,
    /// Sessions started that day
    pub sessions: usize,
}

/// Sessions started per day inside the window, oldest day first
///
/// Days without sessions are left out.
pub fn sessions_over_time(
    sessions: &[AnalyticsSession],
    range: Option<&DateRange>,
) -> Vec<DailySessions> {
    sessions
        .iter()
        .filter(|session| within(range, session.started_at))
        .map(|session| session.started_at.date_naive())
        .counts()
        .into_iter()
        .sorted()
        .map(|(date, sessions)| DailySessions { date, sessions })
        .collect_vec()
}

/// Discoveries of one animal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimalCount {
    /// Animal name
    pub animal: String,
    /// Display glyph
    pub icon: String,
    /// Times it was found
    pub count: usize,
}

/// Most discovered animals inside the window
///
/// Ties are broken alphabetically. Progress rows whose riddle no longer
/// exists are not counted. The result keeps the number of distinct animals
/// found even when truncated to `limit`.
pub fn top_animals(
    progress: &[ProgressRecord],
    riddles: &[Riddle],
    range: Option<&DateRange>,
    limit: usize,
) -> TruncatedVec<AnimalCount> {
    let ranked = progress
        .iter()
        .filter(|record| within(range, record.completed_at))
        .filter_map(|record| riddles.iter().find(|riddle| riddle.id == record.riddle_id))
        .into_group_map_by(|riddle| riddle.animal.clone())
        .into_iter()
        .map(|(animal, found)| AnimalCount {
            animal,
            icon: found
                .iter()
                .map(|riddle| riddle.icon.as_str())
                .find(|icon| !icon.is_empty())
                .unwrap_or(FALLBACK_ICON)
                .to_owned(),
            count: found.len(),
        })
        .sorted_by(|a, b| b.count.cmp(&a.count).then_with(|| a.animal.cmp(&b.animal)))
        .collect_vec();
    let exact_count = ranked.len();
    TruncatedVec::new(ranked.into_iter(), limit, exact_count)
}

/// Summary table shown under the charts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetailedStats {
    /// Families created
    pub total_families: usize,
    /// Mean completed session length in minutes
    pub avg_duration_minutes: u64,
    /// Completed sessions in percent
    pub completion_rate: u32,
    /// Animals found across all families
    pub total_discoveries: usize,
    /// Discoveries per family, rounded
    pub avg_discoveries_per_family: usize,
    /// Sessions still active
    pub active_sessions: usize,
    /// Sessions completed
    pub completed_sessions: usize,
    /// Sessions closed as abandoned
    pub abandoned_sessions: usize,
    /// Every session
    pub total_sessions: usize,
}

impl DetailedStats {
    /// Computes the table from raw rows
    pub fn compute(
        families: &[Family],
        sessions: &[AnalyticsSession],
        progress: &[ProgressRecord],
        range: Option<&DateRange>,
    ) -> Self {
        let total_families = total_families(families, range);
        let total_discoveries = total_discoveries(progress, range);
        let funnel = Funnel::compute(sessions, range);
        Self {
            total_families,
            avg_duration_minutes: average_session_minutes(sessions, range),
            completion_rate: funnel.percent(CompletionStatus::Completed),
            total_discoveries,
            avg_discoveries_per_family: if total_families == 0 {
                0
            } else {
                round(total_discoveries as f64 / total_families as f64) as usize
            },
            active_sessions: funnel.count(CompletionStatus::Active),
            completed_sessions: funnel.count(CompletionStatus::Completed),
            abandoned_sessions: funnel.count(CompletionStatus::Abandoned),
            total_sessions: funnel.total(),
        }
    }
}

/// Aggregated survey answers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SurveySummary {
    /// Responses counted
    pub responses: usize,
    /// Mean recommendation answer, one decimal
    pub average_nps_answer: f64,
    /// Promoters minus detractors, in percent
    pub net_promoter_score: i64,
    /// Mean enjoyment, one decimal
    pub average_enjoyment: f64,
    /// Mean learning value, one decimal
    pub average_learning: f64,
    /// Mean perceived difficulty, one decimal
    pub average_difficulty: f64,
    /// How often each aspect was picked, most picked first
    pub favorite_aspects: Vec<(FavoriteAspect, usize)>,
}

impl SurveySummary {
    /// Summarizes responses filled in inside the window
    pub fn compute(responses: &[SurveyResponse], range: Option<&DateRange>) -> Self {
        let responses = responses
            .iter()
            .filter(|response| within(range, response.completed_at))
            .collect_vec();
        if responses.is_empty() {
            return Self::default();
        }
        let count = responses.len() as f64;
        let mean = |score: fn(&SurveyResponse) -> i64| {
            one_decimal(responses.iter().map(|response| score(response) as f64).sum::<f64>() / count)
        };

        let promoters = responses
            .iter()
            .filter(|response| response.nps_score >= survey_limits::PROMOTER_THRESHOLD)
            .count();
        let detractors = responses
            .iter()
            .filter(|response| response.nps_score <= survey_limits::DETRACTOR_THRESHOLD)
            .count();

        Self {
            responses: responses.len(),
            average_nps_answer: mean(|response| response.nps_score),
            net_promoter_score: round((promoters as f64 - detractors as f64) * 100. / count),
            average_enjoyment: mean(|response| response.enjoyment_level),
            average_learning: mean(|response| response.learning_value),
            average_difficulty: mean(|response| response.difficulty_rating),
            favorite_aspects: responses
                .iter()
                .flat_map(|response| response.favorite_aspects.iter().copied().unique())
                .counts()
                .into_iter()
                .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
                .collect_vec(),
        }
    }
}

/// Everything the analytics page shows for one date window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    /// Window the figures cover
    pub filter: DateFilter,
    /// Headline figures
    pub stats: DetailedStats,
    /// Sessions by status
    pub funnel: Funnel,
    /// Daily session counts
    pub sessions_over_time: Vec<DailySessions>,
    /// Most discovered animals
    pub top_animals: TruncatedVec<AnimalCount>,
    /// Survey results
    pub surveys: SurveySummary,
}

fn rows_or_empty<T>(table: &str, rows: GatewayResult<Vec<T>>) -> Vec<T> {
    rows.unwrap_or_else(|e| {
        log::error!("Could not read {table} for analytics: {e}");
        Vec::new()
    })
}

impl Dashboard {
    /// Reads every table and computes the dashboard for a window ending at `now`
    pub fn load<G: PersistenceGateway, S: RiddleStore>(
        gateway: &G,
        riddle_store: &S,
        options: &Options,
        filter: DateFilter,
        now: DateTime<Utc>,
    ) -> Self {
        let range = filter.range(now);
        let range = range.as_ref();

        let families = rows_or_empty("families", gateway.list_families());
        let sessions = rows_or_empty("sessions", gateway.list_sessions());
        let progress = rows_or_empty("family_progress", gateway.list_all_progress());
        let riddles = rows_or_empty("riddles", riddle_store.list_riddles());
        let surveys = rows_or_empty("survey_responses", gateway.list_surveys());

        Self {
            filter,
            stats: DetailedStats::compute(&families, &sessions, &progress, range),
            funnel: Funnel::compute(&sessions, range),
            sessions_over_time: sessions_over_time(&sessions, range),
            top_animals: top_animals(&progress, &riddles, range, options.top_animals_limit()),
            surveys: SurveySummary::compute(&surveys, range),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{
        id::{Id, RiddleId},
        memory::MemoryGateway,
        riddle::{Difficulty, DifficultyFilter, tests::riddle},
    };

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn session(started_at: DateTime<Utc>, minutes: Option<i64>, status: CompletionStatus) -> AnalyticsSession {
        AnalyticsSession {
            started_at,
            ended_at: minutes.map(|minutes| started_at + Duration::minutes(minutes)),
            completion_status: status,
            ..AnalyticsSession::start(Id::new(), DifficultyFilter::All)
        }
    }

    fn found(riddle_id: u64, completed_at: DateTime<Utc>) -> ProgressRecord {
        ProgressRecord {
            completed_at,
            ..ProgressRecord::new(Id::new(), RiddleId(riddle_id), 10)
        }
    }

    fn response(nps_score: i64, aspects: &[FavoriteAspect]) -> SurveyResponse {
        SurveyResponse {
            id: Id::new(),
            session_id: Id::new(),
            nps_score,
            enjoyment_level: 4,
            learning_value: 5,
            difficulty_rating: 2,
            favorite_aspects: aspects.to_vec(),
            improvements: None,
            would_recommend: None,
            age_group: None,
            completed_at: at(10, 12),
        }
    }

    #[test]
    fn test_date_filters() {
        let now = at(30, 12);
        assert_eq!(DateFilter::AllTime.range(now), None);

        let week = DateFilter::Last7Days.range(now).unwrap();
        assert_eq!(week.start, at(23, 12));
        assert!(week.contains(at(23, 12)));
        assert!(!week.contains(at(23, 11)));

        let month = DateFilter::Last30Days.range(now).unwrap();
        assert_eq!(month.start, Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap());

        let parsed: DateFilter = serde_json::from_str(r#""last30days""#).unwrap();
        assert_eq!(parsed, DateFilter::Last30Days);
    }

    #[test]
    fn test_session_figures() {
        let sessions = vec![
            session(at(1, 9), Some(30), CompletionStatus::Completed),
            session(at(1, 15), Some(45), CompletionStatus::Completed),
            session(at(2, 10), None, CompletionStatus::Active),
            session(at(20, 10), None, CompletionStatus::Abandoned),
        ];

        assert_eq!(average_session_minutes(&sessions, None), 38);
        assert_eq!(completion_rate(&sessions, None), 50);

        let funnel = Funnel::compute(&sessions, None);
        assert_eq!(funnel.total(), 4);
        assert_eq!(funnel.count(CompletionStatus::Abandoned), 1);
        assert_eq!(funnel.percent(CompletionStatus::Active), 25);

        let daily = sessions_over_time(&sessions, None);
        assert_eq!(
            daily.iter().map(|day| day.sessions).collect_vec(),
            vec![2, 1, 1]
        );
        assert_eq!(daily[0].date, at(1, 0).date_naive());

        let window = DateFilter::Last7Days.range(at(21, 0));
        assert_eq!(completion_rate(&sessions, window.as_ref()), 0);
        assert_eq!(sessions_over_time(&sessions, window.as_ref()).len(), 1);
    }

    #[test]
    fn test_empty_inputs_are_zero() {
        assert_eq!(average_session_minutes(&[], None), 0);
        assert_eq!(completion_rate(&[], None), 0);
        assert_eq!(Funnel::compute(&[], None), Funnel::default());
        assert_eq!(DetailedStats::compute(&[], &[], &[], None), DetailedStats::default());
        assert_eq!(SurveySummary::compute(&[], None), SurveySummary::default());
    }

    #[test]
    fn test_top_animals() {
        let mut owl = riddle(3, "Owl", Difficulty::Hard, None);
        owl.icon = String::new();
        let riddles = vec![
            riddle(1, "Lion", Difficulty::Easy, Some("Africa")),
            riddle(2, "Zebra", Difficulty::Easy, Some("Africa")),
            owl,
        ];
        let progress = vec![
            found(2, at(1, 9)),
            found(1, at(1, 9)),
            found(2, at(2, 9)),
            found(3, at(3, 9)),
            found(99, at(3, 9)),
        ];

        let top = top_animals(&progress, &riddles, None, 2);
        assert_eq!(top.exact_count(), 3);
        let names = top.items().iter().map(|count| count.animal.as_str()).collect_vec();
        assert_eq!(names, vec!["Zebra", "Lion"]);
        assert_eq!(top.items()[0].count, 2);

        let all = top_animals(&progress, &riddles, None, 10);
        assert_eq!(all.items()[2].icon, FALLBACK_ICON);
    }

    #[test]
    fn test_detailed_stats() {
        let families = vec![
            Family {
                id: Id::new(),
                name: "Smiths".to_owned(),
                selected_difficulty: DifficultyFilter::All,
                created_at: at(1, 8),
            },
            Family {
                id: Id::new(),
                name: "Joneses".to_owned(),
                selected_difficulty: DifficultyFilter::All,
                created_at: at(1, 9),
            },
        ];
        let sessions = vec![
            session(at(1, 8), Some(20), CompletionStatus::Completed),
            session(at(1, 9), None, CompletionStatus::Active),
        ];
        let progress = vec![found(1, at(1, 9)), found(2, at(1, 9)), found(3, at(1, 9))];

        let stats = DetailedStats::compute(&families, &sessions, &progress, None);
        assert_eq!(stats.total_families, 2);
        assert_eq!(stats.avg_duration_minutes, 20);
        assert_eq!(stats.completion_rate, 50);
        assert_eq!(stats.total_discoveries, 3);
        assert_eq!(stats.avg_discoveries_per_family, 2);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.total_sessions, 2);
    }

    #[test]
    fn test_survey_summary() {
        let responses = vec![
            response(10, &[FavoriteAspect::Riddles, FavoriteAspect::Scanning]),
            response(9, &[FavoriteAspect::Riddles]),
            response(7, &[]),
            response(3, &[FavoriteAspect::Points, FavoriteAspect::Points]),
        ];
        let summary = SurveySummary::compute(&responses, None);

        assert_eq!(summary.responses, 4);
        assert_eq!(summary.net_promoter_score, 25);
        assert!((summary.average_nps_answer - 7.3).abs() < f64::EPSILON);
        assert!((summary.average_learning - 5.).abs() < f64::EPSILON);
        assert_eq!(summary.favorite_aspects[0], (FavoriteAspect::Riddles, 2));
        assert!(summary.favorite_aspects.contains(&(FavoriteAspect::Points, 1)));
    }

    #[test]
    fn test_dashboard_degrades_when_offline() {
        let gateway = MemoryGateway::with_riddles([riddle(1, "Lion", Difficulty::Easy, None)]);
        gateway.set_offline(true);

        let dashboard = Dashboard::load(
            &gateway,
            &gateway,
            &Options::default(),
            DateFilter::AllTime,
            Utc::now(),
        );
        assert_eq!(dashboard.stats, DetailedStats::default());
        assert!(dashboard.top_animals.items().is_empty());
        assert!(dashboard.sessions_over_time.is_empty());
    }

    #[test]
    fn test_dashboard_reads_every_table() {
        use crate::records::NewFamily;

        let gateway = MemoryGateway::with_riddles([riddle(1, "Lion", Difficulty::Easy, None)]);
        let family = gateway
            .insert_family(NewFamily {
                name: "Smiths".to_owned(),
                selected_difficulty: DifficultyFilter::All,
            })
            .unwrap();
        gateway
            .insert_progress(ProgressRecord::new(family.id, RiddleId(1), 10))
            .unwrap();
        gateway
            .insert_session(AnalyticsSession::start(family.id, DifficultyFilter::All))
            .unwrap();

        let dashboard = Dashboard::load(
            &gateway,
            &gateway,
            &Options::default(),
            DateFilter::Last7Days,
            Utc::now() + Duration::minutes(1),
        );
        assert_eq!(dashboard.stats.total_families, 1);
        assert_eq!(dashboard.stats.total_discoveries, 1);
        assert_eq!(dashboard.funnel.count(CompletionStatus::Active), 1);
        assert_eq!(dashboard.top_animals.items()[0].animal, "Lion");
        assert_eq!(dashboard.sessions_over_time.len(), 1);
    }
}
