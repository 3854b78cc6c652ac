//! Provider rating aggregation.
//!
//! Summaries are always rebuilt from the full set of visible reviews and
//! stored by replace. Nothing patches a stored average in place.

use crate::models::{Category, CategoryAverages, RatingSummary, Review};

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Integer sums keep the result independent of iteration order.
fn mean(sum: u64, count: u64) -> Option<f64> {
    if count == 0 {
        None
    } else {
        Some(round_one_decimal(sum as f64 / count as f64))
    }
}

fn category_mean<'a>(reviews: impl Iterator<Item = &'a Review>, category: Category) -> Option<f64> {
    let (sum, count) = reviews
        .filter_map(|review| review.categories.get(category))
        .fold((0u64, 0u64), |(sum, count), score| (sum + score.get() as u64, count + 1));
    mean(sum, count)
}

/// Builds the summary for one provider. Reviews that are not visible are
/// ignored, so callers may pass an unfiltered set.
pub fn aggregate<'a, I>(reviews: I) -> RatingSummary
where
    I: IntoIterator<Item = &'a Review>,
{
    let visible: Vec<&Review> = reviews.into_iter().filter(|r| r.is_visible).collect();
    if visible.is_empty() {
        return RatingSummary::empty();
    }

    let count = visible.len() as u64;
    let sum: u64 = visible.iter().map(|r| r.rating.get() as u64).sum();

    RatingSummary {
        average_rating: mean(sum, count),
        review_count: count as i64,
        category_averages: CategoryAverages {
            punctuality: category_mean(visible.iter().copied(), Category::Punctuality),
            communication: category_mean(visible.iter().copied(), Category::Communication),
            professionalism: category_mean(visible.iter().copied(), Category::Professionalism),
            overall: category_mean(visible.iter().copied(), Category::Overall),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReviewCategories, Score};
    use mongodb::bson::{oid::ObjectId, DateTime};

    fn score(value: i32) -> Option<Score> {
        Some(Score::try_from(value).unwrap())
    }

    fn review(rating: i32, categories: ReviewCategories, visible: bool) -> Review {
        let now = DateTime::now();
        Review {
            id: ObjectId::new(),
            booking_id: ObjectId::new(),
            client_id: ObjectId::new(),
            provider_id: ObjectId::new(),
            provider_profile_id: ObjectId::new(),
            rating: Score::try_from(rating).unwrap(),
            comment: None,
            categories,
            is_verified: true,
            is_visible: visible,
            moderated_by: None,
            moderated_at: None,
            moderation_note: None,
            provider_response: None,
            provider_response_at: None,
            reported: false,
            report_reason: None,
            reported_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_reviews_means_no_average() {
        let summary = aggregate(std::iter::empty::<&Review>());
        assert_eq!(summary.average_rating, None);
        assert_eq!(summary.review_count, 0);
        assert_eq!(summary.category_averages, CategoryAverages::default());
    }

    #[test]
    fn averages_round_to_one_decimal() {
        let reviews = vec![
            review(5, ReviewCategories::default(), true),
            review(4, ReviewCategories::default(), true),
            review(4, ReviewCategories::default(), true),
        ];
        let summary = aggregate(&reviews);
        assert_eq!(summary.review_count, 3);
        // 13 / 3 = 4.333...
        assert_eq!(summary.average_rating, Some(4.3));
    }

    #[test]
    fn hidden_reviews_are_excluded() {
        let reviews = vec![
            review(5, ReviewCategories::default(), true),
            review(1, ReviewCategories::default(), false),
        ];
        let summary = aggregate(&reviews);
        assert_eq!(summary.review_count, 1);
        assert_eq!(summary.average_rating, Some(5.0));
    }

    #[test]
    fn absent_categories_do_not_drag_averages() {
        let reviews = vec![
            review(
                4,
                ReviewCategories {
                    punctuality: score(5),
                    ..Default::default()
                },
                true,
            ),
            review(
                2,
                ReviewCategories {
                    punctuality: score(2),
                    communication: score(3),
                    ..Default::default()
                },
                true,
            ),
            review(3, ReviewCategories::default(), true),
        ];
        let summary = aggregate(&reviews);
        assert_eq!(summary.average_rating, Some(3.0));
        assert_eq!(summary.category_averages.punctuality, Some(3.5));
        assert_eq!(summary.category_averages.communication, Some(3.0));
        assert_eq!(summary.category_averages.professionalism, None);
        assert_eq!(summary.category_averages.overall, None);
    }

    #[test]
    fn aggregation_is_order_independent() {
        let mut reviews: Vec<Review> = (1..=5)
            .map(|r| {
                review(
                    r,
                    ReviewCategories {
                        overall: score(6 - r),
                        ..Default::default()
                    },
                    true,
                )
            })
            .collect();
        let forward = aggregate(&reviews);
        reviews.reverse();
        let backward = aggregate(&reviews);
        assert_eq!(forward, backward);
        assert_eq!(
            forward.average_rating.map(f64::to_bits),
            backward.average_rating.map(f64::to_bits)
        );
    }
}
