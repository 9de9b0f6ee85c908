use super::period::MONTH_NAMES;

pub const DEFAULT_BASE_URL: &str =
    "https://www.england.nhs.uk/statistics/wp-content/uploads/sites/2";

/// File name a monthly CSV is published under, e.g. `Monthly-AE-August-2020.csv`.
pub fn source_file_name(year: i32, month: u32) -> String {
    let name = MONTH_NAMES[(month - 1) as usize];
    format!("Monthly-AE-{name}-{year}.csv")
}

/// Full archive URL for one month's CSV.
///
/// Files land in the upload folder of the month AFTER the one they cover,
/// so December's file sits under January of the following year.
pub fn monthly_csv_url(base: &str, year: i32, month: u32) -> String {
    let (folder_year, folder_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    format!(
        "{base}/{folder_year}/{folder_month:02}/{file}",
        file = source_file_name(year, month)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_year_month_lands_in_next_upload_folder() {
        assert_eq!(
            monthly_csv_url(DEFAULT_BASE_URL, 2020, 8),
            "https://www.england.nhs.uk/statistics/wp-content/uploads/sites/2\
             /2020/09/Monthly-AE-August-2020.csv"
        );
    }

    #[test]
    fn december_lands_in_january_of_next_year() {
        assert_eq!(
            monthly_csv_url("http://mirror.test/archive", 2021, 12),
            "http://mirror.test/archive/2022/01/Monthly-AE-December-2021.csv"
        );
    }

    #[test]
    fn file_name_uses_capitalised_month() {
        assert_eq!(source_file_name(2023, 2), "Monthly-AE-February-2023.csv");
    }
}
