//! 报告文本本地化
//!
//! 报告为双语：每一行按主语言（左栏）和副语言（右栏）各绘制一次。

use qc_core::{QcError, Result, Sex};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 支持的报告语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Ru,
    Kk,
    En,
}

impl FromStr for Locale {
    type Err = QcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" | "rus" | "russian" => Ok(Locale::Ru),
            "kk" | "kaz" | "kazakh" => Ok(Locale::Kk),
            "en" | "eng" | "english" => Ok(Locale::En),
            other => Err(QcError::Validation(format!("unsupported report locale: {other}"))),
        }
    }
}

/// 主/副语言组合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalePair {
    pub primary: Locale,
    pub secondary: Locale,
}

impl Default for LocalePair {
    fn default() -> Self {
        Self {
            primary: Locale::Ru,
            secondary: Locale::Kk,
        }
    }
}

impl LocalePair {
    pub fn new(primary: Locale, secondary: Locale) -> Self {
        Self { primary, secondary }
    }

    /// (主语言文本, 副语言文本)
    pub fn label(&self, label: Label) -> (&'static str, &'static str) {
        (label.text(self.primary), label.text(self.secondary))
    }

    /// 标题用的合并写法 “主 / 副”
    pub fn heading(&self, label: Label) -> String {
        let (primary, secondary) = self.label(label);
        if primary == secondary {
            primary.to_string()
        } else {
            format!("{primary} / {secondary}")
        }
    }
}

/// 报告中出现的固定文本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    ReportTitle,
    GeneratedAt,
    PatientSection,
    PatientCode,
    FullName,
    BirthDate,
    PatientSex,
    ExamSection,
    Accession,
    ExamDate,
    Modality,
    ViewType,
    Device,
    Technician,
    Notes,
    ActivitySection,
    TotalRecords,
    ExamsCovered,
    PatientsCovered,
    ActiveDays,
    Period,
    StatusDistribution,
    MajorFlags,
    CriticalFlags,
    AppliedFixes,
    SevereFlags,
    Devices,
    ChartsSection,
    DailyActivity,
    WeekdayHourActivity,
    CorrectionsSection,
    CorrectedGlobal,
    CorrectedExam,
    BeforeAfter,
    HistorySection,
    NoRecords,
    Identification,
    OriginalImage,
    CorrectedImage,
    Male,
    Female,
    OtherSex,
    NotAvailable,
}

impl Label {
    pub fn text(self, locale: Locale) -> &'static str {
        use Label::*;
        use Locale::*;
        match (self, locale) {
            (ReportTitle, Ru) => "Отчёт о контроле качества рентгенограммы",
            (ReportTitle, Kk) => "Рентгенограмма сапасын бақылау есебі",
            (ReportTitle, En) => "Chest X-ray QC report",
            (GeneratedAt, Ru) => "Сформирован",
            (GeneratedAt, Kk) => "Құрылған уақыты",
            (GeneratedAt, En) => "Generated",
            (PatientSection, Ru) | (PatientSection, Kk) => "Пациент",
            (PatientSection, En) => "Patient",
            (PatientCode, Ru) => "Код пациента",
            (PatientCode, Kk) => "Пациент коды",
            (PatientCode, En) => "Patient ID",
            (FullName, Ru) => "ФИО",
            (FullName, Kk) => "Аты-жөні",
            (FullName, En) => "Full name",
            (BirthDate, Ru) => "Дата рождения",
            (BirthDate, Kk) => "Туған күні",
            (BirthDate, En) => "Date of birth",
            (PatientSex, Ru) => "Пол",
            (PatientSex, Kk) => "Жынысы",
            (PatientSex, En) => "Sex",
            (ExamSection, Ru) => "Исследование",
            (ExamSection, Kk) => "Зерттеу",
            (ExamSection, En) => "Exam",
            (Accession, Ru) => "Номер исследования",
            (Accession, Kk) => "Зерттеу нөмірі",
            (Accession, En) => "Accession number",
            (ExamDate, Ru) => "Дата исследования",
            (ExamDate, Kk) => "Зерттеу күні",
            (ExamDate, En) => "Exam date",
            (Modality, Ru) => "Модальность",
            (Modality, Kk) => "Модальділік",
            (Modality, En) => "Modality",
            (ViewType, Ru) | (ViewType, Kk) => "Проекция",
            (ViewType, En) => "View",
            (Device, Ru) | (Device, Kk) => "Аппарат",
            (Device, En) => "Device",
            (Technician, Ru) => "Лаборант",
            (Technician, Kk) => "Зертханашы",
            (Technician, En) => "Technician",
            (Notes, Ru) => "Примечания",
            (Notes, Kk) => "Ескертпелер",
            (Notes, En) => "Notes",
            (ActivitySection, Ru) => "Сводка активности",
            (ActivitySection, Kk) => "Белсенділік қорытындысы",
            (ActivitySection, En) => "Activity summary",
            (TotalRecords, Ru) => "Всего проверок",
            (TotalRecords, Kk) => "Барлық тексерулер",
            (TotalRecords, En) => "Total QC records",
            (ExamsCovered, Ru) => "Исследований",
            (ExamsCovered, Kk) => "Зерттеулер",
            (ExamsCovered, En) => "Exams",
            (PatientsCovered, Ru) => "Пациентов",
            (PatientsCovered, Kk) => "Пациенттер",
            (PatientsCovered, En) => "Patients",
            (ActiveDays, Ru) => "Дней с активностью",
            (ActiveDays, Kk) => "Белсенді күндер",
            (ActiveDays, En) => "Active days",
            (Period, Ru) => "Период",
            (Period, Kk) => "Кезең",
            (Period, En) => "Period",
            (StatusDistribution, Ru) => "Распределение статусов",
            (StatusDistribution, Kk) => "Мәртебелер бөлінісі",
            (StatusDistribution, En) => "Status distribution",
            (MajorFlags, Ru) => "Основные флаги",
            (MajorFlags, Kk) => "Негізгі белгілер",
            (MajorFlags, En) => "Major flags",
            (CriticalFlags, Ru) => "Критические флаги",
            (CriticalFlags, Kk) => "Сыни белгілер",
            (CriticalFlags, En) => "Critical flags",
            (AppliedFixes, Ru) => "Применённые исправления",
            (AppliedFixes, Kk) => "Қолданылған түзетулер",
            (AppliedFixes, En) => "Applied fixes",
            (SevereFlags, Ru) => "Тяжёлые флаги",
            (SevereFlags, Kk) => "Ауыр белгілер",
            (SevereFlags, En) => "Severe flags",
            (Devices, Ru) => "Аппараты",
            (Devices, Kk) => "Аппараттар",
            (Devices, En) => "Devices",
            (ChartsSection, Ru) => "Графики",
            (ChartsSection, Kk) => "Графиктер",
            (ChartsSection, En) => "Charts",
            (DailyActivity, Ru) => "Проверки по дням",
            (DailyActivity, Kk) => "Күндер бойынша тексерулер",
            (DailyActivity, En) => "QC records per day",
            (WeekdayHourActivity, Ru) => "Дни недели (Пн-Вс) × часы UTC (0-23)",
            (WeekdayHourActivity, Kk) => "Апта күндері (Дс-Жс) × UTC сағаттары (0-23)",
            (WeekdayHourActivity, En) => "Weekday (Mon-Sun) × hour UTC (0-23)",
            (CorrectionsSection, Ru) => "Аналитика исправлений",
            (CorrectionsSection, Kk) => "Түзетулер талдауы",
            (CorrectionsSection, En) => "Corrections analytics",
            (CorrectedGlobal, Ru) => "Доля исправленных (всего)",
            (CorrectedGlobal, Kk) => "Түзетілгендер үлесі (барлығы)",
            (CorrectedGlobal, En) => "Corrected share (all)",
            (CorrectedExam, Ru) => "Доля исправленных (исследование)",
            (CorrectedExam, Kk) => "Түзетілгендер үлесі (зерттеу)",
            (CorrectedExam, En) => "Corrected share (exam)",
            (BeforeAfter, Ru) => "До / после исправления",
            (BeforeAfter, Kk) => "Түзетуге дейін / кейін",
            (BeforeAfter, En) => "Before / after correction",
            (HistorySection, Ru) => "История контроля качества",
            (HistorySection, Kk) => "Сапа бақылауының тарихы",
            (HistorySection, En) => "QC history",
            (NoRecords, Ru) => "Нет записей",
            (NoRecords, Kk) => "Жазбалар жоқ",
            (NoRecords, En) => "No records",
            (Identification, Ru) => "Идентификация",
            (Identification, Kk) => "Сәйкестендіру",
            (Identification, En) => "Identification",
            (OriginalImage, Ru) => "Исходное изображение",
            (OriginalImage, Kk) => "Бастапқы сурет",
            (OriginalImage, En) => "Original image",
            (CorrectedImage, Ru) => "Исправленное изображение",
            (CorrectedImage, Kk) => "Түзетілген сурет",
            (CorrectedImage, En) => "Corrected image",
            (Male, Ru) => "Мужской",
            (Male, Kk) => "Ер",
            (Male, En) => "Male",
            (Female, Ru) => "Женский",
            (Female, Kk) => "Әйел",
            (Female, En) => "Female",
            (OtherSex, Ru) => "Другой",
            (OtherSex, Kk) => "Басқа",
            (OtherSex, En) => "Other",
            (NotAvailable, Ru) => "нет данных",
            (NotAvailable, Kk) => "деректер жоқ",
            (NotAvailable, En) => "n/a",
        }
    }

    pub fn for_sex(sex: Option<Sex>) -> Label {
        match sex {
            Some(Sex::Male) => Label::Male,
            Some(Sex::Female) => Label::Female,
            Some(Sex::Other) => Label::OtherSex,
            None => Label::NotAvailable,
        }
    }
}
