use proptest::prelude::*;
use tf_idf_cluster::{
    augmented_term_frequency, distance, inverse_document_frequency, max_frequency, vector_length, vectorize, Corpus,
    Error, KMeans, Vocabulary,
};

fn token_lists() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(prop::collection::vec("[a-e]", 0..8), 1..8)
}

proptest! {
    #[test]
    fn prop_distance_is_symmetric(
        pair in (1usize..16).prop_flat_map(|n| (
            prop::collection::vec(-100.0f64..100.0, n),
            prop::collection::vec(-100.0f64..100.0, n),
        ))
    ) {
        let (a, b) = pair;
        let ab = distance(&a, &b).unwrap();
        let ba = distance(&b, &a).unwrap();
        prop_assert!(ab >= 0.0);
        prop_assert!((ab - ba).abs() < 1e-9);
        prop_assert_eq!(distance(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn prop_term_statistics_bounds(lists in token_lists()) {
        let corpus = Corpus::from_token_lists(lists.clone());
        for doc in &lists {
            let max = max_frequency(doc);
            prop_assert!(max >= 1);
            // "z" never occurs in the generated alphabet
            prop_assert_eq!(augmented_term_frequency("z", doc, max), 0.5);
        }
        for term in ["a", "b", "c", "d", "e"] {
            if lists.iter().all(|doc| doc.iter().any(|t| t == term)) {
                prop_assert!(inverse_document_frequency(term, &corpus).unwrap() <= 0.0);
            }
        }
    }

    #[test]
    fn prop_vectors_are_unit_or_degenerate(lists in token_lists()) {
        let corpus = Corpus::from_token_lists(lists.clone());
        let vocab = Vocabulary::build(&corpus);
        for doc in &lists {
            match vectorize(doc, &corpus, &vocab) {
                Ok(v) => {
                    prop_assert_eq!(v.len(), vocab.len());
                    prop_assert!((vector_length(&v) - 1.0).abs() < 1e-9);
                    prop_assert_eq!(vectorize(doc, &corpus, &vocab).unwrap(), v);
                }
                Err(Error::DegenerateVector { .. }) => {}
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }
    }

    #[test]
    fn prop_kmeans_labels_below_k(
        data in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 2), 1..20),
        k in 1usize..5,
        seed in any::<u64>()
    ) {
        let model = KMeans::new(k).with_seed(seed);
        if k <= data.len() {
            let fit = model.fit(&data).unwrap();
            prop_assert_eq!(fit.centroids.len(), k);
            prop_assert!(fit.iterations <= 100);
            let labels = fit.assign(&data).unwrap();
            prop_assert_eq!(labels.len(), data.len());
            for &l in &labels {
                prop_assert!(l < k);
            }
        } else {
            let insufficient = matches!(model.fit(&data), Err(Error::InsufficientDocuments { .. }));
            prop_assert!(insufficient);
        }
    }
}
