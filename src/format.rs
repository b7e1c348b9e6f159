use crate::group::AggregationGroup;

/// 分を`H:MM`形式へ整形する。
pub fn format_duration(minutes: i64) -> String {
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// 分を小数1桁の時間へ整形する。
pub fn format_hours(minutes: f64) -> String {
    format!("{:.1}", minutes / 60.0)
}

/// 金額を3桁区切り・小数なしの通貨表記へ整形する。
pub fn format_money(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let sign = if rounded < 0 { "-" } else { "" };
    let digits = rounded.abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}₪{}", sign, grouped)
}

/// 全体に対する割合を0〜100で返す。全体が0の場合は0。
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// グループ内のbillableな時間の割合を0〜100で返す。
pub fn billable_percentage(group: &AggregationGroup) -> f64 {
    percentage(group.billable_minutes, group.total_minutes)
}
