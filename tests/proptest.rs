use std::io::Cursor;

use proptest::prelude::*;
use vcfconvert::{
    filter::Expression,
    genotype::{GenotypeClass, decode_site},
    regions::{RegionList, RegionSpec},
    tsv::{self, Columns},
};

fn base() -> impl Strategy<Value = char> {
    prop::sample::select(vec!['A', 'C', 'G', 'T', 'a', 'c', 'g', 't'])
}

fn call() -> impl Strategy<Value = String> {
    prop_oneof![
        base().prop_map(|b| b.to_string()),
        (base(), base()).prop_map(|(a, b)| format!("{a}{b}")),
    ]
}

proptest! {
    #[test]
    fn reader_handles_arbitrary_input(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let reader = tsv::Reader::new(Cursor::new(data), Columns::default(), 2);
        for row in reader {
            let _ = row;
        }
    }

    #[test]
    fn expression_parser_never_panics(input in "\\PC{0,64}") {
        let _ = Expression::parse(&input);
    }

    #[test]
    fn decoded_sites_are_consistent(
        reference in base(),
        calls in proptest::collection::vec(call(), 1..12),
    ) {
        let site = decode_site(reference as u8, calls.iter().map(String::as_str))
            .unwrap()
            .expect("no unusable calls generated");

        prop_assert_eq!(site.reference(), reference.to_ascii_uppercase().to_string());
        prop_assert_eq!(site.calls.len(), calls.len());
        prop_assert_eq!(site.tally.total(), calls.len());

        let mut seen = vec![site.reference().to_string()];
        for call in &calls {
            for b in call.chars() {
                let b = b.to_ascii_uppercase().to_string();
                if !seen.contains(&b) {
                    seen.push(b);
                }
            }
        }
        prop_assert_eq!(&site.alleles, &seen);

        let mut hom_ref = 0;
        for (call, text) in site.calls.iter().zip(&calls) {
            let first = call.first.unwrap();
            let second = call.second.unwrap();
            prop_assert!(first < site.alleles.len() && second < site.alleles.len());

            let bytes: Vec<char> = text.chars().map(|c| c.to_ascii_uppercase()).collect();
            prop_assert_eq!(&site.alleles[first], &bytes[0].to_string());
            prop_assert_eq!(&site.alleles[second], &bytes[bytes.len() - 1].to_string());

            if GenotypeClass::classify(first, second) == GenotypeClass::HomRef {
                hom_ref += 1;
            }
        }
        prop_assert_eq!(site.tally.hom_ref, hom_ref);
    }

    #[test]
    fn merged_regions_are_sorted_and_disjoint(
        spans in proptest::collection::vec((1u64..500, 0u64..50), 1..20),
    ) {
        let list = spans
            .iter()
            .map(|(start, len)| format!("1:{}-{}", start, start + len))
            .collect::<Vec<_>>()
            .join(",");
        let regions = RegionList::from_spec(&RegionSpec::new(list, false)).unwrap();
        let merged = regions.merged();

        for pair in merged.windows(2) {
            prop_assert!(pair[0].end + 1 < pair[1].start);
        }
        for (start, len) in &spans {
            let end = start + len;
            prop_assert!(merged.iter().any(|i| i.start <= *start && end <= i.end));
        }
    }
}
