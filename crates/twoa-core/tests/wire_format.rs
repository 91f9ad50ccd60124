//! # Wire Format Tests (T0-T3)
//!
//! If ANY tier fails, the codec is INVALID.
//!
//! ## Tiers
//! - T0: Document Boundary
//! - T1: Define-Once Encoding
//! - T2: Fail-Fast Decoding
//! - T3: Adjacency & Ordering
//! - T4: Scale

use std::sync::Arc;
use twoa_core::{
    Category, Codec, CodecConfig, CodecError, CollectingSink, DecodeOrder, DiagnosticCategory,
    KSRank, KState, KStructure, Namespace, Rank, RankOrder, ReferenceKind, Severity, StateId,
    decode_kstructure, encode_kstructure, select_descendants,
};

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<TwoA xmlns="http://www.w3.org/twoa" xmlns:xsd="http://www.w3.org/2001/XMLSchema">"#;

const CATEGORIES: &str = r#"
  <PCategories>
    <PCategory xsd:id="c1"><Rating>0.5</Rating></PCategory>
    <PCategory xsd:id="c2"><Rating>-1.2</Rating></PCategory>
  </PCategories>
  <RankOrder>
    <Params><Threshold>0.1</Threshold></Params>
    <Ranks>
      <Rank Index="0"><PCategory xsd:idref="c1"/><PCategory xsd:idref="c2"/></Rank>
    </Ranks>
  </RankOrder>"#;

/// Wrap a `KStructure` body into a full document with the standard categories.
fn document(kstructure: &str) -> String {
    format!("{HEADER}{CATEGORIES}\n  <KStructure>{kstructure}</KStructure>\n</TwoA>")
}

fn state(id: &str, previous: &[&str]) -> String {
    let refs: String = previous
        .iter()
        .map(|p| format!(r#"<KState xsd:idref="{p}"/>"#))
        .collect();
    format!(
        r#"<KState xsd:id="{id}" Type="core"><PCategories/><PreviousStates>{refs}</PreviousStates><NextStates/></KState>"#
    )
}

fn root_rank(id: &str) -> String {
    format!(r#"<KSRank Index="0"><KState xsd:id="{id}"/></KSRank>"#)
}

fn rank(index: i32, states: &[String]) -> String {
    format!(r#"<KSRank Index="{index}">{}</KSRank>"#, states.concat())
}

/// The scenario from the format description: c1, c2, threshold 0.1, s0 -> s1.
fn concrete_structure() -> KStructure {
    let c1 = Category::shared("c1", 0.5);
    let c2 = Category::shared("c2", -1.2);

    let mut order = RankOrder::new(0.1);
    order.push_rank(Rank::with_categories(0, vec![c1.clone(), c2]));

    let mut structure = KStructure::new(order);
    let mut r0 = KSRank::new(0);
    r0.push_state(KState::root("s0"));
    let mut r1 = KSRank::new(1);
    r1.push_state(KState::new("s1", "normal").with_categories(vec![c1]));
    structure.push_rank(r0);
    structure.push_rank(r1);
    structure
        .link(&StateId::new("s0"), &StateId::new("s1"))
        .expect("link");
    structure
}

// =============================================================================
// TIER T0: DOCUMENT BOUNDARY
// =============================================================================

mod t0_document_boundary {
    use super::*;

    /// T0.1: Rendered text starts with a standalone declaration and binds both namespaces.
    #[test]
    fn rendered_document_has_declaration_and_namespaces() {
        let text = encode_kstructure(&mut concrete_structure()).expect("encode");

        assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(text.contains(r#"<TwoA xmlns="http://www.w3.org/twoa" xmlns:xsd="http://www.w3.org/2001/XMLSchema">"#));
    }

    /// T0.2: Rendered text is indented.
    #[test]
    fn rendered_document_is_indented() {
        let text = encode_kstructure(&mut concrete_structure()).expect("encode");
        assert!(text.contains("\n  <PCategories>"));
    }

    /// T0.3: Empty text is invalid input.
    #[test]
    fn empty_text_rejected() {
        assert!(matches!(decode_kstructure(""), Err(CodecError::InvalidInput(_))));
    }

    /// T0.4: Non-XML text is rejected.
    #[test]
    fn garbage_rejected() {
        assert!(decode_kstructure("<TwoA><oops></TwoA>").is_err());
    }

    /// T0.5: Decoding accepts an already parsed document.
    #[test]
    fn decode_accepts_parsed_document() {
        let codec = Codec::default();
        let document = codec.encode(&mut concrete_structure()).expect("encode");
        let decoded = codec.decode(&document).expect("decode");
        assert_eq!(decoded.state_count(), 2);
    }

    /// T0.6: Elements outside the TwoA namespace are not domain elements.
    #[test]
    fn foreign_namespace_root_rejected() {
        let text = r#"<TwoA xmlns="urn:something-else"/>"#;
        assert!(matches!(decode_kstructure(text), Err(CodecError::InvalidInput(_))));
    }
}

// =============================================================================
// TIER T1: DEFINE-ONCE ENCODING
// =============================================================================

mod t1_define_once {
    use super::*;

    /// T1.1: Each category is defined exactly once, in the rank-order section.
    #[test]
    fn categories_defined_once() {
        let document = Codec::default()
            .encode(&mut concrete_structure())
            .expect("encode");

        let definitions: Vec<_> = select_descendants(&document.root, &["PCategories", "PCategory"])
            .filter_map(|c| c.attribute(&Namespace::Schema, "id"))
            .collect();
        assert_eq!(definitions, vec!["c1", "c2"]);

        let state_refs = select_descendants(&document.root, &["KStructure", "KSRank"])
            .flat_map(|r| r.children_named("KState"))
            .flat_map(|s| select_descendants(s, &["PCategories", "PCategory"]))
            .collect::<Vec<_>>();
        assert_eq!(state_refs.len(), 1);
        assert!(state_refs[0].attribute(&Namespace::Schema, "id").is_none());
        assert_eq!(state_refs[0].attribute(&Namespace::Schema, "idref"), Some("c1"));
    }

    /// T1.2: Sorted and unsorted inputs encode identically.
    #[test]
    fn encoding_is_order_independent() {
        let mut sorted = concrete_structure();
        let mut shuffled = concrete_structure();
        shuffled.ranks.reverse();

        let a = encode_kstructure(&mut sorted).expect("encode");
        let b = encode_kstructure(&mut shuffled).expect("encode");
        assert_eq!(a, b);
    }

    /// T1.3: Missing sections are skipped with warnings, not errors.
    #[test]
    fn empty_structure_encodes_to_bare_root() {
        let sink = Arc::new(CollectingSink::new());
        let codec = Codec::with_sink(CodecConfig::default(), sink.clone());

        let text = codec
            .encode_to_string(&mut KStructure::default())
            .expect("encode");
        assert!(text.contains("<TwoA"));
        assert!(!text.contains("KStructure"));
        assert_eq!(sink.count(Severity::Warning), 2);
        assert_eq!(sink.count(Severity::Error), 0);
    }
}

// =============================================================================
// TIER T2: FAIL-FAST DECODING
// =============================================================================

mod t2_fail_fast {
    use super::*;

    /// T2.1: A dangling predecessor reference voids the decode.
    #[test]
    fn dangling_predecessor_rejected() {
        let text = document(&format!(
            "{}{}",
            root_rank("s0"),
            rank(1, &[state("s1", &["nobody"])])
        ));
        let result = decode_kstructure(&text);
        assert!(matches!(
            result,
            Err(CodecError::UnresolvedReference { kind: ReferenceKind::State, ref id, .. }) if id == "nobody"
        ));
    }

    /// T2.2: A non-numeric threshold voids the decode.
    #[test]
    fn malformed_threshold_rejected() {
        let text = document(&root_rank("s0")).replace("<Threshold>0.1</Threshold>", "<Threshold>x</Threshold>");
        assert!(matches!(
            decode_kstructure(&text),
            Err(CodecError::MalformedValue { .. })
        ));
    }

    /// T2.3: A missing rank index voids the decode.
    #[test]
    fn missing_index_rejected() {
        let text = document(&root_rank("s0")).replace(r#"<Rank Index="0">"#, "<Rank>");
        assert!(matches!(
            decode_kstructure(&text),
            Err(CodecError::MissingAttribute { ref attribute, .. }) if attribute == "Index"
        ));
    }

    /// T2.4: A non-integer rank index voids the decode.
    #[test]
    fn malformed_index_rejected() {
        let text = document(&root_rank("s0")).replace(r#"<KSRank Index="0">"#, r#"<KSRank Index="zero">"#);
        assert!(matches!(
            decode_kstructure(&text),
            Err(CodecError::MalformedValue { .. })
        ));
    }

    /// T2.5: An unknown category on a state voids the decode.
    #[test]
    fn unresolved_state_category_rejected() {
        let bad_state = state("s1", &["s0"]).replace(
            "<PCategories/>",
            r#"<PCategories><PCategory xsd:idref="c7"/></PCategories>"#,
        );
        let text = document(&format!("{}{}", root_rank("s0"), rank(1, &[bad_state])));
        assert!(matches!(
            decode_kstructure(&text),
            Err(CodecError::UnresolvedReference { kind: ReferenceKind::Category, .. })
        ));
    }

    /// T2.6: A duplicated state identifier voids the decode.
    #[test]
    fn duplicate_state_rejected() {
        let text = document(&format!(
            "{}{}",
            root_rank("s0"),
            rank(1, &[state("s1", &["s0"]), state("s1", &["s0"])])
        ));
        assert!(matches!(
            decode_kstructure(&text),
            Err(CodecError::DuplicateDefinition { kind: ReferenceKind::State, .. })
        ));
    }

    /// T2.7: Rank 0 must hold exactly one state.
    #[test]
    fn root_rank_layout_enforced() {
        let empty = document(r#"<KSRank Index="0"/>"#);
        assert!(matches!(
            decode_kstructure(&empty),
            Err(CodecError::MissingElement { .. })
        ));

        let two = document(r#"<KSRank Index="0"><KState xsd:id="a"/><KState xsd:id="b"/></KSRank>"#);
        assert!(matches!(
            decode_kstructure(&two),
            Err(CodecError::InvalidStructure(_))
        ));
    }

    /// T2.8: A category in two ranks of the order is rejected.
    #[test]
    fn duplicate_membership_rejected() {
        let text = document(&root_rank("s0")).replace(
            r#"</Rank>"#,
            r#"</Rank><Rank Index="1"><PCategory xsd:idref="c1"/></Rank>"#,
        );
        assert!(matches!(
            decode_kstructure(&text),
            Err(CodecError::DuplicateMembership { first: 0, second: 1, .. })
        ));

        let lenient = Codec::new(CodecConfig {
            unique_membership: false,
            ..CodecConfig::default()
        });
        assert!(lenient.decode_str(&text).is_ok());
    }

    /// T2.9: Failure is reported to the sink with context.
    #[test]
    fn failure_reported_with_context() {
        let sink = Arc::new(CollectingSink::new());
        let codec = Codec::with_sink(CodecConfig::default(), sink.clone());
        let text = document(&format!(
            "{}{}",
            root_rank("s0"),
            rank(3, &[state("s9", &["ghost"])])
        ));

        assert!(codec.decode_str(&text).is_err());

        let errors: Vec<_> = sink
            .diagnostics()
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, DiagnosticCategory::Reference);
        assert!(errors[0].message.contains("ghost"));
        assert!(errors[0].message.contains("s9"));
        assert!(errors[0].message.contains("KSRank 3"));
    }

    /// T2.10: A category definition without an identifier voids the decode.
    #[test]
    fn category_definition_without_id_rejected() {
        let text = document(&root_rank("s0")).replace(
            r#"<PCategory xsd:id="c2">"#,
            "<PCategory>",
        );
        assert!(matches!(
            decode_kstructure(&text),
            Err(CodecError::MissingAttribute { ref attribute, .. }) if attribute == "xsd:id"
        ));
    }

    /// T2.11: A category reference without a target voids the decode.
    #[test]
    fn category_reference_without_idref_rejected() {
        let text = document(&root_rank("s0")).replace(r#"<PCategory xsd:idref="c2"/>"#, "<PCategory/>");
        assert!(matches!(
            decode_kstructure(&text),
            Err(CodecError::MissingAttribute { ref attribute, .. }) if attribute == "xsd:idref"
        ));
    }

    /// T2.12: A category definition without a rating voids the decode.
    #[test]
    fn category_without_rating_rejected() {
        let text = document(&root_rank("s0")).replace("<Rating>0.5</Rating>", "");
        assert!(matches!(
            decode_kstructure(&text),
            Err(CodecError::MissingElement { ref element, .. }) if element == "Rating"
        ));
    }

    /// T2.13: The encoder refuses a state whose category the order never defines.
    #[test]
    fn encoder_rejects_undefined_state_category() {
        let mut structure = concrete_structure();
        structure.ranks[1].states[0]
            .categories
            .push(Category::shared("orphan", 1.0));
        assert!(matches!(
            encode_kstructure(&mut structure),
            Err(CodecError::UnresolvedReference { kind: ReferenceKind::Category, ref id, .. })
                if id == "orphan"
        ));
    }
}

// =============================================================================
// TIER T3: ADJACENCY & ORDERING
// =============================================================================

mod t3_adjacency {
    use super::*;

    fn two_pass() -> Codec {
        Codec::new(CodecConfig::default().with_decode_order(DecodeOrder::TwoPass))
    }

    /// T3.1: The concrete scenario survives a round trip.
    #[test]
    fn concrete_scenario_round_trip() {
        let text = encode_kstructure(&mut concrete_structure()).expect("encode");
        let decoded = decode_kstructure(&text).expect("decode");

        let s0 = StateId::new("s0");
        let s1 = StateId::new("s1");
        assert_eq!(decoded.state(&s1).expect("s1").previous, vec![s0.clone()]);
        assert_eq!(decoded.state(&s0).expect("s0").next, vec![s1]);
        assert_eq!(decoded.rank_order.threshold, 0.1);
        assert_eq!(decoded.rank_order.ranks[0].categories[1].rating, -1.2);
    }

    /// T3.2: Successors are derived from predecessors symmetrically.
    #[test]
    fn decoded_adjacency_is_symmetric() {
        let text = document(&format!(
            "{}{}{}",
            root_rank("r"),
            rank(1, &[state("a", &["r"]), state("b", &["r"])]),
            rank(2, &[state("c", &["a", "b"])])
        ));
        let decoded = decode_kstructure(&text).expect("decode");

        assert!(decoded.is_symmetric());
        let root = decoded.root().expect("root");
        assert_eq!(root.next, vec![StateId::new("a"), StateId::new("b")]);
        let a = decoded.state(&StateId::new("a")).expect("a");
        assert_eq!(a.next, vec![StateId::new("c")]);
    }

    /// T3.3: Sequential decoding requires ancestors before descendants.
    #[test]
    fn sequential_rejects_forward_reference() {
        let text = document(&format!(
            "{}{}{}",
            root_rank("r"),
            rank(2, &[state("c", &["a"])]),
            rank(1, &[state("a", &["r"])])
        ));
        assert!(matches!(
            decode_kstructure(&text),
            Err(CodecError::UnresolvedReference { kind: ReferenceKind::State, .. })
        ));
    }

    /// T3.4: Two-pass decoding accepts any document order.
    #[test]
    fn two_pass_accepts_forward_reference() {
        let text = document(&format!(
            "{}{}{}",
            root_rank("r"),
            rank(2, &[state("c", &["a"])]),
            rank(1, &[state("a", &["r"])])
        ));
        let decoded = two_pass().decode_str(&text).expect("decode");

        // Ranks keep document order on decode.
        let indices: Vec<i32> = decoded.ranks.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 2, 1]);
        assert!(decoded.is_symmetric());
        assert_eq!(
            decoded.state(&StateId::new("a")).expect("a").next,
            vec![StateId::new("c")]
        );
    }

    /// T3.5: Two-pass decoding rejects cycles.
    #[test]
    fn two_pass_rejects_cycle() {
        let text = document(&format!(
            "{}{}",
            root_rank("r"),
            rank(1, &[state("a", &["r", "b"]), state("b", &["a"])])
        ));
        assert!(matches!(
            two_pass().decode_str(&text),
            Err(CodecError::CyclicReference(_))
        ));
    }

    /// T3.6: A state cannot be its own predecessor.
    #[test]
    fn self_reference_rejected_in_both_orders() {
        let text = document(&format!(
            "{}{}",
            root_rank("r"),
            rank(1, &[state("a", &["a"])])
        ));
        assert!(decode_kstructure(&text).is_err());
        assert!(two_pass().decode_str(&text).is_err());
    }

    /// T3.7: A repeated predecessor reference links once.
    #[test]
    fn repeated_predecessor_links_once() {
        let text = document(&format!(
            "{}{}",
            root_rank("r"),
            rank(1, &[state("a", &["r", "r"])])
        ));
        let decoded = decode_kstructure(&text).expect("decode");
        assert_eq!(decoded.root().expect("root").next.len(), 1);
        assert_eq!(
            decoded.state(&StateId::new("a")).expect("a").previous.len(),
            1
        );
    }
}

// =============================================================================
// TIER T4: SCALE
// =============================================================================

mod t4_scale {
    use super::*;

    const FAN_OUT: usize = 20_000;

    /// A root with `FAN_OUT` successors, as rendered by the encoder.
    fn wide_text() -> String {
        let states: Vec<String> = (0..FAN_OUT)
            .map(|i| state(&format!("s{i}"), &["root"]))
            .collect();
        document(&format!("{}{}", root_rank("root"), rank(1, &states)))
    }

    /// T4.1: A wide rank decodes in both orders with full adjacency.
    #[test]
    fn wide_rank_decodes() {
        let text = wide_text();
        let two_pass = Codec::new(CodecConfig::default().with_decode_order(DecodeOrder::TwoPass));

        for decoded in [
            decode_kstructure(&text).expect("sequential"),
            two_pass.decode_str(&text).expect("two-pass"),
        ] {
            assert_eq!(decoded.state_count(), FAN_OUT + 1);
            assert_eq!(decoded.root().expect("root").next.len(), FAN_OUT);
            assert!(decoded.is_symmetric());
        }
    }

    /// T4.2: A wide rank survives a full round trip.
    #[test]
    fn wide_rank_round_trips() {
        let mut decoded = decode_kstructure(&wide_text()).expect("decode");
        let text = encode_kstructure(&mut decoded).expect("encode");
        let again = decode_kstructure(&text).expect("decode again");
        assert_eq!(again, decoded);
    }
}
